// cf. https://www.geopackage.org/spec140/index.html#table_definition_sql

// gpkg_contents: lists all geospatial contents in the package with identifying
// and descriptive metadata for user display and access.
pub(crate) const SQL_GPKG_CONTENTS: &str = "
CREATE TABLE gpkg_contents (
  table_name TEXT NOT NULL PRIMARY KEY,
  data_type TEXT NOT NULL,
  identifier TEXT UNIQUE,
  description TEXT DEFAULT '',
  last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
  min_x DOUBLE,
  min_y DOUBLE,
  max_x DOUBLE,
  max_y DOUBLE,
  srs_id INTEGER,
  CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);
";

// gpkg_extensions: declares which extensions apply to the GeoPackage, a table,
// or a column so clients can detect requirements without scanning user tables.
pub(crate) const SQL_GPKG_EXTENSIONS: &str = "
CREATE TABLE gpkg_extensions (
  table_name TEXT,
  column_name TEXT,
  extension_name TEXT NOT NULL,
  definition TEXT NOT NULL,
  scope TEXT NOT NULL,
  CONSTRAINT ge_tce UNIQUE (table_name, column_name, extension_name)
);
";

pub(crate) const SQL_INSERT_GPKG_SPATIAL_REF_SYS: &str = "
INSERT INTO gpkg_spatial_ref_sys
  (srs_name, srs_id, organization, organization_coordsys_id, definition, description)
VALUES
  (?1, ?2, ?3, ?4, ?5, ?6)
";

pub(crate) const SQL_INSERT_GPKG_CONTENTS: &str = "
INSERT INTO gpkg_contents
  (table_name, data_type, identifier, description, min_x, min_y, max_x, max_y, srs_id)
VALUES
  (?1, ?2, ?3, '', ?4, ?5, ?6, ?7, ?8)
";

pub(crate) const SQL_INSERT_GPKG_GEOMETRY_COLUMNS: &str = "
INSERT INTO gpkg_geometry_columns
  (table_name, column_name, geometry_type_name, srs_id, z, m)
VALUES
  (?1, ?2, ?3, ?4, ?5, ?6)
";

pub(crate) const SQL_INSERT_GPKG_TILE_MATRIX_SET: &str = "
INSERT INTO gpkg_tile_matrix_set
  (table_name, srs_id, min_x, min_y, max_x, max_y)
VALUES
  (?1, ?2, ?3, ?4, ?5, ?6)
";

pub(crate) const SQL_INSERT_GPKG_TILE_MATRIX: &str = "
INSERT INTO gpkg_tile_matrix
  (table_name, zoom_level, matrix_width, matrix_height, tile_width, tile_height, pixel_x_size, pixel_y_size)
VALUES
  (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
";

pub(crate) const SQL_SELECT_CONTENTS: &str = "
SELECT table_name, data_type, identifier, description, last_change,
       min_x, min_y, max_x, max_y, srs_id
FROM gpkg_contents
WHERE table_name = ?1
";

pub(crate) const SQL_SELECT_CONTENTS_BY_DATA_TYPE: &str = "
SELECT table_name FROM gpkg_contents WHERE data_type = ?1 ORDER BY table_name
";

pub(crate) const SQL_SELECT_SPATIAL_REF_SYS: &str = "
SELECT srs_name, srs_id, organization, organization_coordsys_id, definition, description
FROM gpkg_spatial_ref_sys
WHERE srs_id = ?1
";

pub(crate) const SQL_SELECT_GEOMETRY_COLUMNS: &str = "
SELECT table_name, column_name, geometry_type_name, srs_id, z, m
FROM gpkg_geometry_columns
WHERE table_name = ?1
";

pub(crate) const SQL_SELECT_TILE_MATRIX_SET: &str = "
SELECT table_name, srs_id, min_x, min_y, max_x, max_y
FROM gpkg_tile_matrix_set
WHERE table_name = ?1
";

// The pixel size tie-break keeps the finest entry last when a zoom level is
// declared more than once.
pub(crate) const SQL_SELECT_TILE_MATRICES: &str = "
SELECT table_name, zoom_level, matrix_width, matrix_height, tile_width, tile_height,
       pixel_x_size, pixel_y_size
FROM gpkg_tile_matrix
WHERE table_name = ?1
ORDER BY zoom_level ASC, pixel_x_size DESC, pixel_y_size DESC
";

pub(crate) const SQL_TABLE_EXISTS: &str =
    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)";

pub(crate) const SQL_SRS_EXISTS: &str =
    "SELECT EXISTS(SELECT 1 FROM gpkg_spatial_ref_sys WHERE srs_id = ?1)";

pub(crate) const SQL_TABLE_COLUMNS: &str =
    "SELECT cid, name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid";

/// Quote an SQL identifier, doubling any embedded double quote.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn join_columns<'a, I>(columns: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    columns
        .into_iter()
        .map(quote_identifier)
        .collect::<Vec<String>>()
        .join(", ")
}

pub(crate) fn sql_create_table(table: &str, column_defs: &str) -> String {
    format!("CREATE TABLE {} ({})", quote_identifier(table), column_defs)
}

// cf. https://www.geopackage.org/spec140/index.html#tiles_user_tables
pub(crate) fn sql_create_tile_table(table: &str) -> String {
    sql_create_table(
        table,
        "id INTEGER PRIMARY KEY AUTOINCREMENT, \
         zoom_level INTEGER NOT NULL, \
         tile_column INTEGER NOT NULL, \
         tile_row INTEGER NOT NULL, \
         tile_data BLOB NOT NULL, \
         UNIQUE (zoom_level, tile_column, tile_row)",
    )
}

pub(crate) fn sql_select<'a, I>(
    table: &str,
    columns: I,
    where_clause: Option<&str>,
    order_by: Option<&str>,
) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut sql = format!(
        "SELECT {} FROM {}",
        join_columns(columns),
        quote_identifier(table)
    );
    if let Some(where_clause) = where_clause {
        sql.push_str(" WHERE ");
        sql.push_str(where_clause);
    }
    if let Some(order_by) = order_by {
        sql.push_str(" ORDER BY ");
        sql.push_str(order_by);
    }
    sql
}

pub(crate) fn sql_count(table: &str, where_clause: Option<&str>) -> String {
    match where_clause {
        Some(w) => format!("SELECT COUNT(*) FROM {} WHERE {w}", quote_identifier(table)),
        None => format!("SELECT COUNT(*) FROM {}", quote_identifier(table)),
    }
}

pub(crate) fn sql_delete(table: &str, where_clause: Option<&str>) -> String {
    match where_clause {
        Some(w) => format!("DELETE FROM {} WHERE {w}", quote_identifier(table)),
        None => format!("DELETE FROM {}", quote_identifier(table)),
    }
}

pub(crate) fn sql_insert<'a, I>(table: &str, columns: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let names: Vec<&str> = columns.into_iter().collect();
    if names.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(table));
    }
    let placeholders = (1..=names.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<String>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table),
        join_columns(names),
        placeholders
    )
}

/// `UPDATE` setting every given column, keyed by the primary key bound last.
pub(crate) fn sql_update<'a, I>(table: &str, columns: I, primary_key: &str) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let assignments: Vec<String> = columns
        .into_iter()
        .enumerate()
        .map(|(i, name)| format!("{} = ?{}", quote_identifier(name), i + 1))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE {} = ?{}",
        quote_identifier(table),
        assignments.join(", "),
        quote_identifier(primary_key),
        assignments.len() + 1
    )
}

pub(crate) fn initialize_gpkg(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SQL_GPKG_SPATIAL_REF_SYS)?;
    register_default_srs_ids(conn)?;
    conn.execute_batch(SQL_GPKG_CONTENTS)?;
    conn.execute_batch(SQL_GPKG_GEOMETRY_COLUMNS)?;
    conn.execute_batch(SQL_GPKG_TILE_MATRIX_SET)?;
    conn.execute_batch(SQL_GPKG_TILE_MATRIX)?;
    conn.execute_batch(SQL_GPKG_EXTENSIONS)?;
    Ok(())
}

// gpkg_geometry_columns: identifies geometry columns and geometry types for
// vector feature user data tables.
pub(crate) const SQL_GPKG_GEOMETRY_COLUMNS: &str = "
CREATE TABLE gpkg_geometry_columns (
  table_name TEXT NOT NULL,
  column_name TEXT NOT NULL,
  geometry_type_name TEXT NOT NULL,
  srs_id INTEGER NOT NULL,
  z TINYINT NOT NULL,
  m TINYINT NOT NULL,
  CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
  CONSTRAINT uk_gc_table_name UNIQUE (table_name),
  CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
  CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys (srs_id)
);
";

// gpkg_spatial_ref_sys: the SRS catalog referenced by gpkg_contents and
// gpkg_geometry_columns to describe spatial reference systems.
pub(crate) const SQL_GPKG_SPATIAL_REF_SYS: &str = "
CREATE TABLE gpkg_spatial_ref_sys (
  srs_name TEXT NOT NULL,
  srs_id INTEGER PRIMARY KEY,
  organization TEXT NOT NULL,
  organization_coordsys_id INTEGER NOT NULL,
  definition  TEXT NOT NULL,
  description TEXT
);
";

// The three entries every GeoPackage must carry. Other SRS rows are added by
// callers through `Gpkg::register_srs`.
fn register_default_srs_ids(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    const EPSG4326_WKT: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AXIS["Latitude",NORTH],AXIS["Longitude",EAST],AUTHORITY["EPSG","4326"]]"#;

    let sql = SQL_INSERT_GPKG_SPATIAL_REF_SYS;
    conn.execute(
        sql,
        rusqlite::params!["WGS 84", 4326, "EPSG", 4326, EPSG4326_WKT, "WGS 84"],
    )?;
    conn.execute(
        sql,
        rusqlite::params![
            "Undefined Cartesian SRS",
            -1,
            "NONE",
            -1,
            "undefined",
            "undefined Cartesian coordinate reference system"
        ],
    )?;
    conn.execute(
        sql,
        rusqlite::params![
            "Undefined geographic SRS",
            0,
            "NONE",
            0,
            "undefined",
            "undefined geographic coordinate reference system"
        ],
    )?;
    Ok(())
}

// gpkg_tile_matrix: documents tile pyramid structure per zoom level (tile size,
// matrix size, and pixel sizes) to support non-square tiles and varied intervals.
pub(crate) const SQL_GPKG_TILE_MATRIX: &str = "
CREATE TABLE gpkg_tile_matrix(
  table_name TEXT NOT NULL,
  zoom_level INTEGER NOT NULL,
  matrix_width INTEGER NOT NULL,
  matrix_height INTEGER NOT NULL,
  tile_width INTEGER NOT NULL,
  tile_height INTEGER NOT NULL,
  pixel_x_size DOUBLE NOT NULL,
  pixel_y_size DOUBLE NOT NULL,
  CONSTRAINT pk_ttm PRIMARY KEY(table_name, zoom_level),
  CONSTRAINT fk_tmm_table_name FOREIGN KEY(table_name) REFERENCES gpkg_contents(table_name)
);
CREATE TRIGGER 'gpkg_tile_matrix_zoom_level_insert' BEFORE INSERT ON 'gpkg_tile_matrix' FOR EACH ROW BEGIN SELECT RAISE(ABORT, 'insert on table ''gpkg_tile_matrix'' violates constraint: zoom_level cannot be less than 0') WHERE (NEW.zoom_level < 0); END;
CREATE TRIGGER 'gpkg_tile_matrix_zoom_level_update' BEFORE UPDATE of zoom_level ON 'gpkg_tile_matrix' FOR EACH ROW BEGIN SELECT RAISE(ABORT, 'update on table ''gpkg_tile_matrix'' violates constraint: zoom_level cannot be less than 0') WHERE (NEW.zoom_level < 0); END;
CREATE TRIGGER 'gpkg_tile_matrix_matrix_width_insert' BEFORE INSERT ON 'gpkg_tile_matrix' FOR EACH ROW BEGIN SELECT RAISE(ABORT, 'insert on table ''gpkg_tile_matrix'' violates constraint: matrix_width cannot be less than 1') WHERE (NEW.matrix_width < 1); END;
CREATE TRIGGER 'gpkg_tile_matrix_matrix_width_update' BEFORE UPDATE OF matrix_width ON 'gpkg_tile_matrix' FOR EACH ROW BEGIN SELECT RAISE(ABORT, 'update on table ''gpkg_tile_matrix'' violates constraint: matrix_width cannot be less than 1') WHERE (NEW.matrix_width < 1); END;
CREATE TRIGGER 'gpkg_tile_matrix_matrix_height_insert' BEFORE INSERT ON 'gpkg_tile_matrix' FOR EACH ROW BEGIN SELECT RAISE(ABORT, 'insert on table ''gpkg_tile_matrix'' violates constraint: matrix_height cannot be less than 1') WHERE (NEW.matrix_height < 1); END;
CREATE TRIGGER 'gpkg_tile_matrix_matrix_height_update' BEFORE UPDATE OF matrix_height ON 'gpkg_tile_matrix' FOR EACH ROW BEGIN SELECT RAISE(ABORT, 'update on table ''gpkg_tile_matrix'' violates constraint: matrix_height cannot be less than 1') WHERE (NEW.matrix_height < 1); END;
CREATE TRIGGER 'gpkg_tile_matrix_pixel_x_size_insert' BEFORE INSERT ON 'gpkg_tile_matrix' FOR EACH ROW BEGIN SELECT RAISE(ABORT, 'insert on table ''gpkg_tile_matrix'' violates constraint: pixel_x_size must be greater than 0') WHERE NOT (NEW.pixel_x_size > 0); END;
CREATE TRIGGER 'gpkg_tile_matrix_pixel_x_size_update' BEFORE UPDATE OF pixel_x_size ON 'gpkg_tile_matrix' FOR EACH ROW BEGIN SELECT RAISE(ABORT, 'update on table ''gpkg_tile_matrix'' violates constraint: pixel_x_size must be greater than 0') WHERE NOT (NEW.pixel_x_size > 0); END;
CREATE TRIGGER 'gpkg_tile_matrix_pixel_y_size_insert' BEFORE INSERT ON 'gpkg_tile_matrix' FOR EACH ROW BEGIN SELECT RAISE(ABORT, 'insert on table ''gpkg_tile_matrix'' violates constraint: pixel_y_size must be greater than 0') WHERE NOT (NEW.pixel_y_size > 0); END;
CREATE TRIGGER 'gpkg_tile_matrix_pixel_y_size_update' BEFORE UPDATE OF pixel_y_size ON 'gpkg_tile_matrix' FOR EACH ROW BEGIN SELECT RAISE(ABORT, 'update on table ''gpkg_tile_matrix'' violates constraint: pixel_y_size must be greater than 0') WHERE NOT (NEW.pixel_y_size > 0); END;
";

// gpkg_tile_matrix_set: defines SRS and overall bounds for all tiles in a tile
// pyramid user data table.
pub(crate) const SQL_GPKG_TILE_MATRIX_SET: &str = "
CREATE TABLE gpkg_tile_matrix_set (
  table_name TEXT NOT NULL PRIMARY KEY,
  srs_id INTEGER NOT NULL,
  min_x DOUBLE NOT NULL,
  min_y DOUBLE NOT NULL,
  max_x DOUBLE NOT NULL,
  max_y DOUBLE NOT NULL,
  CONSTRAINT fk_gtms_table_name FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
  CONSTRAINT fk_gtms_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys (srs_id)
);
";

#[cfg(test)]
mod tests {
    use super::{quote_identifier, sql_count, sql_insert, sql_select, sql_update};

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_identifier("tiles"), r#""tiles""#);
        assert_eq!(quote_identifier(r#"a"b"#), r#""a""b""#);
    }

    #[test]
    fn statement_builders() {
        assert_eq!(
            sql_select("t", ["id", "name"], Some(r#""id" = ?"#), Some("id DESC")),
            r#"SELECT "id", "name" FROM "t" WHERE "id" = ? ORDER BY id DESC"#
        );
        assert_eq!(sql_count("t", None), r#"SELECT COUNT(*) FROM "t""#);
        assert_eq!(
            sql_insert("t", ["a", "b"]),
            r#"INSERT INTO "t" ("a", "b") VALUES (?1, ?2)"#
        );
        assert_eq!(
            sql_insert("t", std::iter::empty::<&str>()),
            r#"INSERT INTO "t" DEFAULT VALUES"#
        );
        assert_eq!(
            sql_update("t", ["a"], "id"),
            r#"UPDATE "t" SET "a" = ?1 WHERE "id" = ?2"#
        );
    }
}
