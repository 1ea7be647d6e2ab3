use super::cursor::{RowMapper, UserQuery, UserRowMapper};
use super::dao::UserDao;
use super::feature::{FeatureDao, FeatureRowMapper};
use super::metadata::{
    Contents, DATA_TYPE_ATTRIBUTES, DATA_TYPE_FEATURES, DATA_TYPE_TILES, GeometryColumns,
    SpatialRefSys, TileMatrix, TileMatrixSet,
};
use super::registry::TableRegistry;
use super::table::{TableKind, UserColumn, UserTable};
use super::tile::{TileDao, TileRowMapper};
use crate::conversions::{
    data_type_from_str, data_type_to_str, dimension_to_zm, geometry_type_to_str,
};
use crate::error::{GpkgError, Result};
use crate::ogc_sql::{
    SQL_INSERT_GPKG_CONTENTS, SQL_INSERT_GPKG_GEOMETRY_COLUMNS, SQL_INSERT_GPKG_SPATIAL_REF_SYS,
    SQL_INSERT_GPKG_TILE_MATRIX, SQL_INSERT_GPKG_TILE_MATRIX_SET, SQL_SELECT_CONTENTS,
    SQL_SELECT_CONTENTS_BY_DATA_TYPE, SQL_SELECT_GEOMETRY_COLUMNS, SQL_SELECT_SPATIAL_REF_SYS,
    SQL_SELECT_TILE_MATRICES, SQL_SELECT_TILE_MATRIX_SET, SQL_SRS_EXISTS, SQL_TABLE_COLUMNS,
    SQL_TABLE_EXISTS, initialize_gpkg, quote_identifier, sql_create_table, sql_create_tile_table,
};
use crate::projection::{BoundingBox, ProjProjection};
use crate::types::{ColumnSpec, Value};
use rusqlite::{OpenFlags, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

/// GeoPackage connection and accessor factory.
///
/// Accessors borrow the connection, so they live no longer than the `Gpkg`
/// that built them. Every table an accessor is built for is recorded in the
/// connection's [`TableRegistry`].
#[derive(Debug)]
pub struct Gpkg {
    conn: rusqlite::Connection,
    read_only: bool,
    registry: TableRegistry,
}

impl Gpkg {
    /// Open a GeoPackage in read-only mode.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = rusqlite::Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self::from_connection(conn, true))
    }

    /// Open an existing GeoPackage in read-write mode.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(GpkgError::PathNotFound {
                path: path.to_path_buf(),
            });
        }

        let conn = rusqlite::Connection::open(path)?;
        Ok(Self::from_connection(conn, false))
    }

    /// Create a new GeoPackage with the standard metadata tables.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(GpkgError::PathAlreadyExists {
                path: path.to_path_buf(),
            });
        }

        let conn = rusqlite::Connection::open(path)?;
        initialize_gpkg(&conn)?;
        Ok(Self::from_connection(conn, false))
    }

    /// Create a new GeoPackage in memory
    pub fn new_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;
        initialize_gpkg(&conn)?;
        Ok(Self::from_connection(conn, false))
    }

    fn from_connection(conn: rusqlite::Connection, read_only: bool) -> Self {
        Self {
            conn,
            read_only,
            registry: TableRegistry::default(),
        }
    }

    /// Register a spatial reference system in gpkg_spatial_ref_sys.
    ///
    /// Tables must reference an `srs_id` that already exists. Only `4326`,
    /// `0` and `-1` are present in a new GeoPackage. Tile tables additionally
    /// need an EPSG organization code known to the projection catalog.
    ///
    /// Example: register EPSG:3857 (Web Mercator / Pseudo-Mercator).
    /// ```
    /// # use rusqlite_gpkg_access::Gpkg;
    /// let gpkg = Gpkg::new_in_memory()?;
    /// gpkg.register_srs(
    ///     "WGS 84 / Pseudo-Mercator",
    ///     3857,
    ///     "EPSG",
    ///     3857,
    ///     "PROJCS[\"WGS 84 / Pseudo-Mercator\"]",
    ///     "Web Mercator / Pseudo-Mercator (EPSG:3857)",
    /// )?;
    /// assert!(gpkg.spatial_ref_sys(3857)?.is_some());
    /// # Ok::<(), rusqlite_gpkg_access::GpkgError>(())
    /// ```
    pub fn register_srs(
        &self,
        srs_name: &str,
        srs_id: i32,
        organization: &str,
        organization_coordsys_id: i32,
        definition: &str,
        description: &str,
    ) -> Result<()> {
        self.ensure_writable()?;
        self.conn.execute(
            SQL_INSERT_GPKG_SPATIAL_REF_SYS,
            rusqlite::params![
                srs_name,
                srs_id,
                organization,
                organization_coordsys_id,
                definition,
                description
            ],
        )?;
        Ok(())
    }

    pub fn contents(&self, table: &str) -> Result<Option<Contents>> {
        let mut stmt = self.conn.prepare_cached(SQL_SELECT_CONTENTS)?;
        Ok(stmt.query_row([table], Contents::from_row).optional()?)
    }

    pub fn spatial_ref_sys(&self, srs_id: i32) -> Result<Option<SpatialRefSys>> {
        let mut stmt = self.conn.prepare_cached(SQL_SELECT_SPATIAL_REF_SYS)?;
        Ok(stmt.query_row([srs_id], SpatialRefSys::from_row).optional()?)
    }

    /// `gpkg_geometry_columns` rows for `table`. A valid GeoPackage has at
    /// most one.
    pub fn geometry_columns(&self, table: &str) -> Result<Vec<GeometryColumns>> {
        let mut stmt = self.conn.prepare_cached(SQL_SELECT_GEOMETRY_COLUMNS)?;
        let rows = stmt
            .query_map([table], GeometryColumns::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// `gpkg_tile_matrix_set` rows for `table`. A valid GeoPackage has at most
    /// one.
    pub fn tile_matrix_sets(&self, table: &str) -> Result<Vec<TileMatrixSet>> {
        let mut stmt = self.conn.prepare_cached(SQL_SELECT_TILE_MATRIX_SET)?;
        let rows = stmt
            .query_map([table], TileMatrixSet::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Tile matrices of `table` by ascending zoom level, then descending pixel
    /// size.
    pub fn tile_matrices(&self, table: &str) -> Result<Vec<TileMatrix>> {
        let mut stmt = self.conn.prepare_cached(SQL_SELECT_TILE_MATRICES)?;
        let rows = stmt
            .query_map([table], TileMatrix::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Names of the feature tables listed in gpkg_contents.
    pub fn feature_tables(&self) -> Result<Vec<String>> {
        self.tables_of_type(DATA_TYPE_FEATURES)
    }

    /// Names of the tile tables listed in gpkg_contents.
    pub fn tile_tables(&self) -> Result<Vec<String>> {
        self.tables_of_type(DATA_TYPE_TILES)
    }

    fn tables_of_type(&self, data_type: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(SQL_SELECT_CONTENTS_BY_DATA_TYPE)?;
        let names = stmt
            .query_map([data_type], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Create a feature table with an `fid` primary key, the geometry column
    /// and `columns`, and register it in gpkg_contents and
    /// gpkg_geometry_columns.
    pub fn create_feature_table(
        &self,
        table: &str,
        geometry_column: &str,
        geometry_type: wkb::reader::GeometryType,
        geometry_dimension: wkb::reader::Dimension,
        srs_id: i32,
        columns: &[ColumnSpec],
    ) -> Result<FeatureDao<'_>> {
        self.ensure_new_table(table)?;
        self.ensure_srs_exists(srs_id)?;

        let geometry_type_name = geometry_type_to_str(geometry_type);
        let (z, m) = dimension_to_zm(geometry_dimension);

        let mut column_defs = Vec::with_capacity(columns.len() + 2);
        column_defs.push("fid INTEGER PRIMARY KEY AUTOINCREMENT".to_string());
        column_defs.push(format!(
            "{} {geometry_type_name}",
            quote_identifier(geometry_column)
        ));
        column_defs.extend(columns.iter().map(column_def));

        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(&sql_create_table(table, &column_defs.join(", ")))?;
        tx.execute(
            SQL_INSERT_GPKG_CONTENTS,
            rusqlite::params![
                table,
                DATA_TYPE_FEATURES,
                table,
                None::<f64>,
                None::<f64>,
                None::<f64>,
                None::<f64>,
                srs_id
            ],
        )?;
        tx.execute(
            SQL_INSERT_GPKG_GEOMETRY_COLUMNS,
            rusqlite::params![table, geometry_column, geometry_type_name, srs_id, z, m],
        )?;
        tx.commit()?;

        self.feature_dao(table)
    }

    /// Create a tile table with the standard tile columns, and register it in
    /// gpkg_contents and gpkg_tile_matrix_set. Tile matrices are added with
    /// [`create_tile_matrix`](Self::create_tile_matrix).
    pub fn create_tile_table(&self, table: &str, srs_id: i32, bbox: &BoundingBox) -> Result<()> {
        self.ensure_new_table(table)?;
        self.ensure_srs_exists(srs_id)?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(&sql_create_tile_table(table))?;
        tx.execute(
            SQL_INSERT_GPKG_CONTENTS,
            rusqlite::params![
                table,
                DATA_TYPE_TILES,
                table,
                bbox.min_x,
                bbox.min_y,
                bbox.max_x,
                bbox.max_y,
                srs_id
            ],
        )?;
        tx.execute(
            SQL_INSERT_GPKG_TILE_MATRIX_SET,
            rusqlite::params![table, srs_id, bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn create_tile_matrix(&self, matrix: &TileMatrix) -> Result<()> {
        self.ensure_writable()?;
        self.conn.execute(
            SQL_INSERT_GPKG_TILE_MATRIX,
            rusqlite::params![
                matrix.table_name,
                matrix.zoom_level,
                matrix.matrix_width,
                matrix.matrix_height,
                matrix.tile_width,
                matrix.tile_height,
                matrix.pixel_x_size,
                matrix.pixel_y_size
            ],
        )?;
        Ok(())
    }

    /// Create an attributes table (no geometry) with an `id` primary key.
    pub fn create_attributes_table(
        &self,
        table: &str,
        columns: &[ColumnSpec],
    ) -> Result<UserDao<'_, UserRowMapper>> {
        self.ensure_new_table(table)?;

        let mut column_defs = Vec::with_capacity(columns.len() + 1);
        column_defs.push("id INTEGER PRIMARY KEY AUTOINCREMENT".to_string());
        column_defs.extend(columns.iter().map(column_def));

        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(&sql_create_table(table, &column_defs.join(", ")))?;
        tx.execute(
            SQL_INSERT_GPKG_CONTENTS,
            rusqlite::params![
                table,
                DATA_TYPE_ATTRIBUTES,
                table,
                None::<f64>,
                None::<f64>,
                None::<f64>,
                None::<f64>,
                None::<i32>
            ],
        )?;
        tx.commit()?;

        self.user_dao(table)
    }

    /// Generic accessor over any user table with a single primary key.
    pub fn user_dao(&self, table: &str) -> Result<UserDao<'_, UserRowMapper>> {
        let user_table = self.read_user_table(table, TableKind::Attributes, None)?;
        Ok(UserDao::new(self, user_table, UserRowMapper))
    }

    /// Feature accessor for the table named `table`.
    pub fn feature_dao(&self, table: &str) -> Result<FeatureDao<'_>> {
        let geometry_columns = single(
            self.geometry_columns(table)?,
            table,
            "gpkg_geometry_columns",
        )?
        .ok_or_else(|| GpkgError::TableNotFound {
            table: table.to_string(),
            metadata: "gpkg_geometry_columns",
        })?;
        self.feature_dao_for_geometry_columns(geometry_columns)
    }

    /// Feature accessor for a `gpkg_contents` entry.
    pub fn feature_dao_for_contents(&self, contents: &Contents) -> Result<FeatureDao<'_>> {
        let table = contents.table_name.as_str();
        let geometry_columns = single(
            self.geometry_columns(table)?,
            table,
            "gpkg_geometry_columns",
        )?
        .ok_or_else(|| GpkgError::MissingGeometryColumns {
            table: table.to_string(),
        })?;
        self.feature_dao_for_geometry_columns(geometry_columns)
    }

    pub fn feature_dao_for_geometry_columns(
        &self,
        geometry_columns: GeometryColumns,
    ) -> Result<FeatureDao<'_>> {
        let user_table = self.read_user_table(
            &geometry_columns.table_name,
            TableKind::Features,
            Some(&geometry_columns.column_name),
        )?;
        tracing::debug!(
            table = user_table.name(),
            columns = user_table.column_count(),
            geometry_column = %geometry_columns.column_name,
            "built feature accessor"
        );
        Ok(FeatureDao::new(self, user_table, geometry_columns))
    }

    /// Tile accessor for the table named `table`.
    pub fn tile_dao(&self, table: &str) -> Result<TileDao<'_>> {
        let tile_matrix_set = single(
            self.tile_matrix_sets(table)?,
            table,
            "gpkg_tile_matrix_set",
        )?
        .ok_or_else(|| GpkgError::TableNotFound {
            table: table.to_string(),
            metadata: "gpkg_tile_matrix_set",
        })?;
        self.tile_dao_for_matrix_set(tile_matrix_set)
    }

    /// Tile accessor for a `gpkg_contents` entry.
    pub fn tile_dao_for_contents(&self, contents: &Contents) -> Result<TileDao<'_>> {
        let table = contents.table_name.as_str();
        let tile_matrix_set = single(
            self.tile_matrix_sets(table)?,
            table,
            "gpkg_tile_matrix_set",
        )?
        .ok_or_else(|| GpkgError::MissingTileMatrixSet {
            table: table.to_string(),
        })?;
        self.tile_dao_for_matrix_set(tile_matrix_set)
    }

    /// Tile accessor for a tile matrix set. The set must have a contents entry
    /// and a known spatial reference system, whose projection converts tile
    /// sizes to meters.
    pub fn tile_dao_for_matrix_set(&self, tile_matrix_set: TileMatrixSet) -> Result<TileDao<'_>> {
        let table = tile_matrix_set.table_name.clone();
        if self.contents(&table)?.is_none() {
            return Err(GpkgError::MissingContents { table });
        }
        let srs = self.spatial_ref_sys(tile_matrix_set.srs_id)?.ok_or(
            GpkgError::MissingSpatialRefSysId {
                srs_id: tile_matrix_set.srs_id,
            },
        )?;
        let projection = ProjProjection::from_spatial_ref_sys(&srs)?;

        let tile_matrices = self.tile_matrices(&table)?;
        let user_table = self.read_user_table(&table, TableKind::Tiles, None)?;
        tracing::debug!(
            table = %table,
            columns = user_table.column_count(),
            levels = tile_matrices.len(),
            min_zoom = tile_matrices.first().map(|m| m.zoom_level),
            max_zoom = tile_matrices.last().map(|m| m.zoom_level),
            "built tile accessor"
        );

        Ok(TileDao::new(
            self,
            user_table,
            tile_matrix_set,
            tile_matrices,
            Box::new(projection),
        ))
    }

    /// Run caller SQL over a table registered by an earlier accessor and read
    /// the result as typed rows of that table. Result columns are matched to
    /// table columns by name; unknown columns are ignored.
    pub fn query_registered(
        &self,
        table: &str,
        sql: &str,
        args: &[Value],
    ) -> Result<UserQuery<'_, UserRowMapper>> {
        let user_table = self.registered(table, None)?;
        self.registered_query(user_table, sql, args, UserRowMapper)
    }

    /// [`query_registered`](Self::query_registered) over a table registered
    /// by a feature accessor, yielding [`FeatureRow`]s.
    pub fn query_registered_features(
        &self,
        table: &str,
        sql: &str,
        args: &[Value],
    ) -> Result<UserQuery<'_, FeatureRowMapper>> {
        let user_table = self.registered(table, Some(TableKind::Features))?;
        self.registered_query(user_table, sql, args, FeatureRowMapper)
    }

    /// [`query_registered`](Self::query_registered) over a table registered
    /// by a tile accessor, yielding [`TileRow`]s.
    pub fn query_registered_tiles(
        &self,
        table: &str,
        sql: &str,
        args: &[Value],
    ) -> Result<UserQuery<'_, TileRowMapper>> {
        let user_table = self.registered(table, Some(TableKind::Tiles))?;
        self.registered_query(user_table, sql, args, TileRowMapper)
    }

    fn registered(&self, table: &str, kind: Option<TableKind>) -> Result<Arc<UserTable>> {
        let metadata = match kind {
            None => "table registry",
            Some(TableKind::Features) => "feature table registry",
            Some(TableKind::Tiles) => "tile table registry",
            Some(TableKind::Attributes) => "attributes table registry",
        };
        self.registry
            .get(table)
            .filter(|user_table| kind.is_none_or(|kind| user_table.kind() == kind))
            .ok_or_else(|| GpkgError::TableNotFound {
                table: table.to_string(),
                metadata,
            })
    }

    fn registered_query<M: RowMapper + Clone>(
        &self,
        user_table: Arc<UserTable>,
        sql: &str,
        args: &[Value],
        mapper: M,
    ) -> Result<UserQuery<'_, M>> {
        tracing::trace!(
            table = user_table.name(),
            sql,
            args = args.len(),
            "registered query"
        );
        let stmt = self.conn.prepare_cached(sql)?;
        Ok(UserQuery::new(stmt, args.to_vec(), user_table, mapper))
    }

    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    pub(crate) fn connection(&self) -> &rusqlite::Connection {
        &self.conn
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Read the physical schema of `table` and register it.
    pub(crate) fn read_user_table(
        &self,
        table: &str,
        kind: TableKind,
        geometry_column: Option<&str>,
    ) -> Result<Arc<UserTable>> {
        let mut stmt = self.conn.prepare_cached(SQL_TABLE_COLUMNS)?;
        let raw_columns = stmt
            .query_map([table], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if raw_columns.is_empty() {
            return Err(GpkgError::TableNotFound {
                table: table.to_string(),
                metadata: "sqlite_master",
            });
        }

        let mut columns = Vec::with_capacity(raw_columns.len());
        for (cid, name, declared_type, not_null, primary_key) in raw_columns {
            let (data_type, max) =
                data_type_from_str(&declared_type).ok_or_else(|| GpkgError::UnsupportedColumnType {
                    table: table.to_string(),
                    column: name.clone(),
                    declared_type: declared_type.clone(),
                })?;
            let geometry = geometry_column == Some(name.as_str());
            columns.push(UserColumn {
                index: usize::try_from(cid).map_err(|_| GpkgError::ValueOutOfRange {
                    target: "usize",
                })?,
                name,
                data_type,
                max,
                not_null: not_null != 0,
                primary_key: primary_key != 0,
                geometry,
            });
        }

        let user_table = Arc::new(UserTable::new(table, kind, columns)?);
        self.registry.register(user_table.clone());
        Ok(user_table)
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(GpkgError::ReadOnly);
        }
        Ok(())
    }

    fn ensure_new_table(&self, table: &str) -> Result<()> {
        self.ensure_writable()?;
        let exists: bool = self
            .conn
            .query_row(SQL_TABLE_EXISTS, [table], |row| row.get(0))?;
        if exists {
            return Err(GpkgError::TableAlreadyExists {
                table: table.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_srs_exists(&self, srs_id: i32) -> Result<()> {
        let exists: bool = self
            .conn
            .query_row(SQL_SRS_EXISTS, [srs_id], |row| row.get(0))?;
        if !exists {
            return Err(GpkgError::MissingSpatialRefSysId { srs_id });
        }
        Ok(())
    }
}

fn column_def(spec: &ColumnSpec) -> String {
    let mut def = format!(
        "{} {}",
        quote_identifier(&spec.name),
        data_type_to_str(spec.data_type)
    );
    if let Some(max) = spec.max {
        def.push_str(&format!("({max})"));
    }
    if spec.not_null {
        def.push_str(" NOT NULL");
    }
    def
}

// Table names are unique in every metadata table that is looked up by name.
fn single<T>(mut rows: Vec<T>, table: &str, metadata: &'static str) -> Result<Option<T>> {
    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.pop()),
        count => Err(GpkgError::AmbiguousTable {
            table: table.to_string(),
            metadata,
            count,
        }),
    }
}
