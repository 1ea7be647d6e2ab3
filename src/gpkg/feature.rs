use super::cursor::RowMapper;
use super::dao::UserDao;
use super::geometry::GeometryData;
use super::gpkg::Gpkg;
use super::metadata::GeometryColumns;
use super::row::UserRow;
use super::table::UserTable;
use crate::error::Result;
use crate::types::Value;
use geo_traits::GeometryTrait;
use std::ops::Deref;
use std::sync::Arc;

/// A row of a feature table.
#[derive(Clone, Debug)]
pub struct FeatureRow {
    row: UserRow,
}

impl FeatureRow {
    pub fn id(&self) -> Option<i64> {
        self.row.id()
    }

    /// Decode the geometry column. `None` for a null or empty blob.
    pub fn geometry(&self) -> Result<Option<GeometryData>> {
        match self.row.table().geometry_index() {
            Some(index) => self.row.value_at(index)?.try_into(),
            None => Ok(None),
        }
    }

    pub fn set_geometry(&mut self, geometry: Option<GeometryData>) {
        if let Some(index) = self.row.table().geometry_index() {
            self.row.values_mut()[index] = geometry.into();
        }
    }

    pub fn value(&self, column: &str) -> Result<Value> {
        self.row.value(column)
    }

    pub fn set_value(&mut self, column: &str, value: impl Into<Value>) -> Result<()> {
        self.row.set_value(column, value)
    }

    pub fn user_row(&self) -> &UserRow {
        &self.row
    }

    pub fn into_user_row(self) -> UserRow {
        self.row
    }
}

impl AsRef<UserRow> for FeatureRow {
    fn as_ref(&self) -> &UserRow {
        &self.row
    }
}

/// Maps cursor rows of a feature table to [`FeatureRow`]s. The geometry blob
/// stays undecoded until [`FeatureRow::geometry`] is called.
#[derive(Clone, Copy, Debug, Default)]
pub struct FeatureRowMapper;

impl RowMapper for FeatureRowMapper {
    type Row = FeatureRow;

    fn map_row(&self, row: UserRow) -> FeatureRow {
        FeatureRow { row }
    }
}

/// Accessor for a feature table and its `gpkg_geometry_columns` entry.
///
/// Dereferences to the generic [`UserDao`] for queries, counts and writes.
#[derive(Debug)]
pub struct FeatureDao<'a> {
    dao: UserDao<'a, FeatureRowMapper>,
    geometry_columns: GeometryColumns,
}

impl<'a> FeatureDao<'a> {
    pub(crate) fn new(
        gpkg: &'a Gpkg,
        table: Arc<UserTable>,
        geometry_columns: GeometryColumns,
    ) -> Self {
        Self {
            dao: UserDao::new(gpkg, table, FeatureRowMapper),
            geometry_columns,
        }
    }

    pub fn geometry_columns(&self) -> &GeometryColumns {
        &self.geometry_columns
    }

    pub fn geometry_column_name(&self) -> &str {
        &self.geometry_columns.column_name
    }

    pub fn srs_id(&self) -> i32 {
        self.geometry_columns.srs_id
    }

    pub fn geometry_type(&self) -> Result<wkb::reader::GeometryType> {
        self.geometry_columns.geometry_type()
    }

    pub fn new_feature_row(&self) -> FeatureRow {
        FeatureRow {
            row: self.dao.new_row(),
        }
    }

    /// Insert a feature from any `geo-traits` geometry plus property values,
    /// encoding the geometry in the table's srs.
    pub fn insert_geometry<G>(&self, geometry: &G, properties: &[(&str, Value)]) -> Result<i64>
    where
        G: GeometryTrait<T = f64>,
    {
        let mut row = self.new_feature_row();
        row.set_geometry(Some(GeometryData::from_geometry(self.srs_id(), geometry)?));
        for (column, value) in properties {
            row.set_value(column, value.clone())?;
        }
        self.dao.insert(&row)
    }
}

impl<'a> Deref for FeatureDao<'a> {
    type Target = UserDao<'a, FeatureRowMapper>;

    fn deref(&self) -> &Self::Target {
        &self.dao
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GpkgError;
    use crate::types::{ColumnSpec, DataType};
    use geo_traits::PointTrait;
    use geo_types::{LineString, Point};
    use wkb::reader::{Dimension, GeometryType};

    fn roads(gpkg: &Gpkg) -> Result<FeatureDao<'_>> {
        gpkg.create_feature_table(
            "roads",
            "geom",
            GeometryType::LineString,
            Dimension::Xy,
            4326,
            &[
                ColumnSpec::new("name", DataType::Text),
                ColumnSpec::new("lanes", DataType::Int8),
            ],
        )
    }

    #[test]
    fn insert_and_read_back_geometry() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let dao = roads(&gpkg)?;
        assert_eq!(dao.geometry_column_name(), "geom");
        assert_eq!(dao.srs_id(), 4326);
        assert_eq!(dao.geometry_type()?, GeometryType::LineString);

        let line = LineString::from(vec![(0.0, 0.0), (3.0, 4.0)]);
        let id = dao.insert_geometry(
            &line,
            &[("name", "main".into()), ("lanes", Value::Int8(2))],
        )?;

        let row = dao.query_for_id(id)?.expect("inserted feature");
        assert_eq!(row.id(), Some(id));
        assert_eq!(row.value("lanes")?, Value::Int8(2));
        let geometry = row.geometry()?.expect("geometry present");
        assert_eq!(geometry.srs_id(), 4326);
        let envelope = geometry.envelope().expect("envelope");
        assert_eq!((envelope.max_x, envelope.max_y), (3.0, 4.0));
        Ok(())
    }

    #[test]
    fn null_geometry_reads_as_none() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let dao = roads(&gpkg)?;
        let mut row = dao.new_feature_row();
        row.set_value("name", "unmapped")?;
        dao.insert(&row)?;

        let rows = dao.query_for_eq("name", "unmapped")?.collect_rows()?;
        assert_eq!(rows.len(), 1);
        assert!(rows[0].geometry()?.is_none());
        Ok(())
    }

    #[test]
    fn replace_geometry_with_update() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let dao = roads(&gpkg)?;
        let line = LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]);
        let id = dao.insert_geometry(&line, &[])?;

        let mut row = dao.query_for_id(id)?.expect("inserted feature");
        let point = Point::new(5.0, 6.0);
        row.set_geometry(Some(GeometryData::from_geometry(4326, &point)?));
        assert_eq!(dao.update(&row)?, 1);

        let row = dao.query_for_id(id)?.expect("updated feature");
        let geometry = row.geometry()?.expect("geometry present");
        let wkb = geometry.wkb()?;
        match wkb.as_type() {
            geo_traits::GeometryType::Point(p) => {
                let coord = p.coord().expect("non-empty point");
                assert_eq!(geo_traits::CoordTrait::x(&coord), 5.0);
            }
            _ => panic!("expected a point"),
        }
        Ok(())
    }

    #[test]
    fn lossy_property_is_rejected() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let dao = roads(&gpkg)?;
        let line = LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]);
        let err = dao
            .insert_geometry(&line, &[("lanes", Value::Int32(2))])
            .expect_err("int32 into TINYINT");
        assert!(matches!(err, GpkgError::ValueTypeMismatch { .. }));
        assert_eq!(dao.count_all()?, 0);
        Ok(())
    }
}
