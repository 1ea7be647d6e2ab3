use crate::error::{GpkgError, Result};
use geo_traits::{
    CoordTrait, GeometryCollectionTrait, GeometryTrait, LineStringTrait, LineTrait,
    MultiLineStringTrait, MultiPointTrait, MultiPolygonTrait, PointTrait, PolygonTrait, RectTrait,
    TriangleTrait,
};
use wkb::reader::Wkb;

const MAGIC: [u8; 2] = [0x47, 0x50];
const HEADER_LEN: usize = 8;

const FLAG_LITTLE_ENDIAN: u8 = 0b0000_0001;
const FLAG_ENVELOPE_MASK: u8 = 0b0000_1110;
const FLAG_EMPTY: u8 = 0b0001_0000;
const FLAG_EXTENDED: u8 = 0b0010_0000;

/// Bounding envelope stored in a GeoPackage geometry header.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Envelope {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub z: Option<(f64, f64)>,
    pub m: Option<(f64, f64)>,
}

impl Envelope {
    pub fn xy(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
            z: None,
            m: None,
        }
    }

    fn indicator(&self) -> u8 {
        match (self.z, self.m) {
            (None, None) => 1,
            (Some(_), None) => 2,
            (None, Some(_)) => 3,
            (Some(_), Some(_)) => 4,
        }
    }

    fn expand(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }
}

/// Decoded GeoPackage geometry blob: the binary header (srs id, flags,
/// envelope) plus the WKB payload.
// cf. https://www.geopackage.org/spec140/index.html#gpb_format
#[derive(Clone, Debug, PartialEq)]
pub struct GeometryData {
    srs_id: i32,
    envelope: Option<Envelope>,
    empty: bool,
    extended: bool,
    wkb: Vec<u8>,
}

impl GeometryData {
    /// Decode a stored geometry column value. `None` and zero-length blobs
    /// decode to `None` instead of failing.
    pub fn from_blob(bytes: Option<&[u8]>) -> Result<Option<Self>> {
        match bytes {
            None | Some([]) => Ok(None),
            Some(bytes) => Self::decode(bytes).map(Some),
        }
    }

    /// Parse a GeoPackage geometry blob.
    pub fn decode(b: &[u8]) -> Result<Self> {
        if b.len() < HEADER_LEN {
            return Err(GpkgError::InvalidGpkgGeometryLength {
                len: b.len(),
                minimum: HEADER_LEN,
            });
        }
        if b[..2] != MAGIC {
            return Err(GpkgError::InvalidGpkgGeometryMagic([b[0], b[1]]));
        }

        let flags = b[3];
        let little_endian = flags & FLAG_LITTLE_ENDIAN != 0;
        let envelope_len: usize = match (flags & FLAG_ENVELOPE_MASK) >> 1 {
            0 => 0,  // no envelope
            1 => 32, // [minx, maxx, miny, maxy]
            2 => 48, // [minx, maxx, miny, maxy, minz, maxz]
            3 => 48, // [minx, maxx, miny, maxy, minm, maxm]
            4 => 64, // [minx, maxx, miny, maxy, minz, maxz, minm, maxm]
            _ => return Err(GpkgError::InvalidGpkgGeometryFlags(flags)),
        };
        let required = HEADER_LEN + envelope_len;
        if b.len() < required {
            return Err(GpkgError::InvalidGpkgGeometryEnvelope {
                len: b.len(),
                required,
            });
        }

        let srs_bytes = [b[4], b[5], b[6], b[7]];
        let srs_id = if little_endian {
            i32::from_le_bytes(srs_bytes)
        } else {
            i32::from_be_bytes(srs_bytes)
        };

        let read = |i: usize| {
            let start = HEADER_LEN + i * 8;
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&b[start..start + 8]);
            if little_endian {
                f64::from_le_bytes(buf)
            } else {
                f64::from_be_bytes(buf)
            }
        };
        let envelope = match (flags & FLAG_ENVELOPE_MASK) >> 1 {
            0 => None,
            indicator => {
                let mut envelope = Envelope::xy(read(0), read(1), read(2), read(3));
                match indicator {
                    2 => envelope.z = Some((read(4), read(5))),
                    3 => envelope.m = Some((read(4), read(5))),
                    4 => {
                        envelope.z = Some((read(4), read(5)));
                        envelope.m = Some((read(6), read(7)));
                    }
                    _ => {}
                }
                Some(envelope)
            }
        };

        let wkb = &b[required..];
        Wkb::try_new(wkb)?;

        Ok(Self {
            srs_id,
            envelope,
            empty: flags & FLAG_EMPTY != 0,
            extended: flags & FLAG_EXTENDED != 0,
            wkb: wkb.to_vec(),
        })
    }

    /// Build geometry data from any geometry, computing the XY envelope.
    pub fn from_geometry<G>(srs_id: i32, geometry: &G) -> Result<Self>
    where
        G: GeometryTrait<T = f64>,
    {
        let mut wkb = Vec::new();
        wkb::writer::write_geometry(&mut wkb, geometry, &Default::default())?;
        Ok(Self::with_envelope(srs_id, bounds_from_geometry(geometry), wkb))
    }

    /// Wrap an existing WKB payload, validating it and computing the XY envelope.
    pub fn from_wkb(srs_id: i32, wkb: Vec<u8>) -> Result<Self> {
        let envelope = bounds_from_geometry(&Wkb::try_new(&wkb)?);
        Ok(Self::with_envelope(srs_id, envelope, wkb))
    }

    fn with_envelope(srs_id: i32, envelope: Option<Envelope>, wkb: Vec<u8>) -> Self {
        Self {
            srs_id,
            empty: envelope.is_none(),
            envelope,
            extended: false,
            wkb,
        }
    }

    /// Encode as a little-endian GeoPackage geometry blob.
    pub fn to_bytes(&self) -> Vec<u8> {
        let envelope_values = self.envelope.as_ref().map(|e| {
            let mut values = vec![e.min_x, e.max_x, e.min_y, e.max_y];
            if let Some((min, max)) = e.z {
                values.extend([min, max]);
            }
            if let Some((min, max)) = e.m {
                values.extend([min, max]);
            }
            values
        });

        let mut flags = FLAG_LITTLE_ENDIAN;
        if let Some(envelope) = &self.envelope {
            flags |= envelope.indicator() << 1;
        }
        if self.empty {
            flags |= FLAG_EMPTY;
        }
        if self.extended {
            flags |= FLAG_EXTENDED;
        }

        let envelope_len = envelope_values.as_ref().map_or(0, |v| v.len() * 8);
        let mut geom = Vec::with_capacity(HEADER_LEN + envelope_len + self.wkb.len());
        geom.extend_from_slice(&[
            MAGIC[0], // magic
            MAGIC[1], // magic
            0x00u8,   // version
            flags,
        ]);
        geom.extend_from_slice(&self.srs_id.to_le_bytes());
        for value in envelope_values.iter().flatten() {
            geom.extend_from_slice(&value.to_le_bytes());
        }
        geom.extend_from_slice(&self.wkb);
        geom
    }

    pub fn srs_id(&self) -> i32 {
        self.srs_id
    }

    pub fn envelope(&self) -> Option<&Envelope> {
        self.envelope.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }

    pub fn wkb_bytes(&self) -> &[u8] {
        &self.wkb
    }

    /// Zero-copy WKB view of the payload.
    pub fn wkb(&self) -> Result<Wkb<'_>> {
        Ok(Wkb::try_new(&self.wkb)?)
    }
}

fn bounds_from_geometry<G: GeometryTrait<T = f64>>(geom: &G) -> Option<Envelope> {
    use geo_traits::GeometryType as GeoType;

    let mut bounds: Option<Envelope> = None;
    match geom.as_type() {
        GeoType::Point(point) => {
            if let Some(coord) = point.coord() {
                add_coord(&mut bounds, &coord);
            }
        }
        GeoType::LineString(line) => add_line_string(&mut bounds, line),
        GeoType::Polygon(poly) => add_polygon(&mut bounds, poly),
        GeoType::MultiPoint(multi) => {
            for point in multi.points() {
                if let Some(coord) = point.coord() {
                    add_coord(&mut bounds, &coord);
                }
            }
        }
        GeoType::MultiLineString(multi) => {
            for line in multi.line_strings() {
                add_line_string(&mut bounds, &line);
            }
        }
        GeoType::MultiPolygon(multi) => {
            for poly in multi.polygons() {
                add_polygon(&mut bounds, &poly);
            }
        }
        GeoType::GeometryCollection(collection) => {
            for sub_geom in collection.geometries() {
                if let Some(sub_bounds) = bounds_from_geometry(&sub_geom) {
                    add_coord_xy(&mut bounds, sub_bounds.min_x, sub_bounds.min_y);
                    add_coord_xy(&mut bounds, sub_bounds.max_x, sub_bounds.max_y);
                }
            }
        }
        GeoType::Rect(rect) => {
            add_coord(&mut bounds, &rect.min());
            add_coord(&mut bounds, &rect.max());
        }
        GeoType::Triangle(triangle) => {
            add_coord(&mut bounds, &triangle.first());
            add_coord(&mut bounds, &triangle.second());
            add_coord(&mut bounds, &triangle.third());
        }
        GeoType::Line(line) => {
            add_coord(&mut bounds, &line.start());
            add_coord(&mut bounds, &line.end());
        }
    }

    bounds
}

fn add_polygon<P: PolygonTrait<T = f64>>(bounds: &mut Option<Envelope>, poly: &P) {
    if let Some(ring) = poly.exterior() {
        add_line_string(bounds, &ring);
    }
    for ring in poly.interiors() {
        add_line_string(bounds, &ring);
    }
}

fn add_line_string<L: LineStringTrait<T = f64>>(bounds: &mut Option<Envelope>, line: &L) {
    for coord in line.coords() {
        add_coord(bounds, &coord);
    }
}

fn add_coord<C: CoordTrait<T = f64>>(bounds: &mut Option<Envelope>, coord: &C) {
    let (x, y) = coord.x_y();
    add_coord_xy(bounds, x, y);
}

fn add_coord_xy(bounds: &mut Option<Envelope>, x: f64, y: f64) {
    match bounds {
        Some(existing) => existing.expand(x, y),
        None => *bounds = Some(Envelope::xy(x, x, y, y)),
    }
}

#[cfg(test)]
mod tests {
    use super::{Envelope, GeometryData};
    use crate::Result;
    use crate::error::GpkgError;
    use geo_types::{Geometry, GeometryCollection, LineString, MultiPoint, Point, Polygon};
    use wkb::reader::GeometryType;

    #[test]
    fn decode_restores_encoded_geometry() -> Result<()> {
        let line = LineString::from(vec![(0.0, 0.0), (2.0, -1.0), (3.5, 4.0)]);
        let data = GeometryData::from_geometry(4326, &line)?;
        assert_eq!(
            data.envelope(),
            Some(&Envelope::xy(0.0, 3.5, -1.0, 4.0))
        );

        let decoded = GeometryData::decode(&data.to_bytes())?;
        assert_eq!(decoded, data);
        assert_eq!(decoded.srs_id(), 4326);
        assert_eq!(decoded.wkb()?.geometry_type(), GeometryType::LineString);
        Ok(())
    }

    #[test]
    fn envelope_covers_collection_members() -> Result<()> {
        let collection = GeometryCollection::from(vec![
            Geometry::Point(Point::new(5.0, -1.0)),
            Geometry::MultiPoint(MultiPoint::from(vec![
                Point::new(-2.0, 2.0),
                Point::new(1.0, 3.0),
            ])),
        ]);
        let data = GeometryData::from_geometry(0, &collection)?;
        assert_eq!(data.envelope(), Some(&Envelope::xy(-2.0, 5.0, -1.0, 3.0)));
        assert!(!data.is_empty());
        Ok(())
    }

    #[test]
    fn polygon_envelope_follows_exterior_and_holes() -> Result<()> {
        let polygon = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 8.0), (0.0, 0.0)]),
            vec![LineString::from(vec![(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (1.0, 1.0)])],
        );
        let data = GeometryData::from_geometry(3857, &polygon)?;
        assert_eq!(data.envelope(), Some(&Envelope::xy(0.0, 10.0, 0.0, 8.0)));
        assert_eq!(
            GeometryData::decode(&data.to_bytes())?.wkb()?.geometry_type(),
            GeometryType::Polygon
        );
        Ok(())
    }

    #[test]
    fn empty_geometry_sets_empty_flag() -> Result<()> {
        let line: LineString<f64> = LineString::new(Vec::new());
        let data = GeometryData::from_geometry(4326, &line)?;
        assert!(data.is_empty());
        assert!(data.envelope().is_none());
        assert_eq!(data.to_bytes()[3] & 0b0001_0000, 0b0001_0000);
        Ok(())
    }

    #[test]
    fn null_or_empty_blob_is_absent() -> Result<()> {
        assert!(GeometryData::from_blob(None)?.is_none());
        assert!(GeometryData::from_blob(Some(&[][..]))?.is_none());
        Ok(())
    }

    #[test]
    fn reads_big_endian_header_with_envelope() -> Result<()> {
        let mut wkb = Vec::new();
        wkb::writer::write_geometry(&mut wkb, &Point::new(1.0, 2.0), &Default::default())?;

        let mut blob = vec![0x47, 0x50, 0x00, 0b0000_0010];
        blob.extend_from_slice(&3857_i32.to_be_bytes());
        for v in [1.0_f64, 1.0, 2.0, 2.0] {
            blob.extend_from_slice(&v.to_be_bytes());
        }
        blob.extend_from_slice(&wkb);

        let data = GeometryData::decode(&blob)?;
        assert_eq!(data.srs_id(), 3857);
        assert_eq!(data.envelope(), Some(&Envelope::xy(1.0, 1.0, 2.0, 2.0)));
        assert_eq!(data.wkb_bytes(), wkb.as_slice());
        Ok(())
    }

    #[test]
    fn rejects_invalid_flags() {
        let mut blob = vec![0x47, 0x50, 0x00, 0x0A, 0, 0, 0, 0];
        blob.extend_from_slice(&[0; 16]);
        let result = GeometryData::decode(&blob);
        assert!(matches!(result, Err(GpkgError::InvalidGpkgGeometryFlags(_))));
    }

    #[test]
    fn rejects_truncated_envelope() {
        let blob = vec![0x47, 0x50, 0x00, 0b0000_0011, 0, 0, 0, 0, 1, 2, 3];
        let result = GeometryData::decode(&blob);
        assert!(matches!(
            result,
            Err(GpkgError::InvalidGpkgGeometryEnvelope {
                len: 11,
                required: 40
            })
        ));
    }

    #[test]
    fn rejects_bad_magic() {
        let blob = vec![0x00, 0x01, 0x00, 0x01, 0, 0, 0, 0];
        assert!(matches!(
            GeometryData::decode(&blob),
            Err(GpkgError::InvalidGpkgGeometryMagic([0x00, 0x01]))
        ));
    }
}
