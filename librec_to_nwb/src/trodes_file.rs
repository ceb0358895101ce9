//! Reader for the extracted data files produced when a Trodes .rec file is exported.
//!
//! Every extracted file has the same shape: a plain text settings block
//!
//! ```text
//! <Start settings>
//! Description: Camera frame timestamps
//! Fields: <PosTimestamp uint32><HWframeCount uint32><HWTimestamp uint64>
//! <End settings>
//! ```
//!
//! followed by packed little-endian records laid out as described by the `Fields` setting.
//! A field type can carry a repeat count (`<data 4*int16>`), in which case the values of
//! each record are flattened into the column.
use byteorder::{ByteOrder, LittleEndian};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::Path;

use super::error::TrodesFileError;

const START_SETTINGS: &str = "<Start settings>";
const END_SETTINGS: &str = "<End settings>";
const FIELDS_KEY: &str = "fields";
const SETTINGS_SEPARATOR: &str = ": ";

/// The primitive types a field may be declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl FieldType {
    fn parse(s: &str) -> Result<Self, TrodesFileError> {
        match s {
            "uint8" => Ok(Self::UInt8),
            "uint16" => Ok(Self::UInt16),
            "uint32" => Ok(Self::UInt32),
            "uint64" => Ok(Self::UInt64),
            "int8" => Ok(Self::Int8),
            "int16" => Ok(Self::Int16),
            "int32" => Ok(Self::Int32),
            "int64" => Ok(Self::Int64),
            "float32" => Ok(Self::Float32),
            "float64" | "float" | "double" => Ok(Self::Float64),
            _ => Err(TrodesFileError::UnsupportedType(s.to_string())),
        }
    }

    /// Size of a single value in bytes
    pub fn size(&self) -> usize {
        match self {
            Self::UInt8 | Self::Int8 => 1,
            Self::UInt16 | Self::Int16 => 2,
            Self::UInt32 | Self::Int32 | Self::Float32 => 4,
            Self::UInt64 | Self::Int64 | Self::Float64 => 8,
        }
    }

    fn empty_column(&self) -> FieldData {
        match self {
            Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64 => FieldData::UInt(Vec::new()),
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 => FieldData::Int(Vec::new()),
            Self::Float32 | Self::Float64 => FieldData::Float(Vec::new()),
        }
    }
}

/// One `<name type>` entry of the Fields setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldType,
    pub repeats: usize,
}

impl FieldSpec {
    fn record_bytes(&self) -> usize {
        self.kind.size() * self.repeats
    }
}

/// A column of values read from the data section.
///
/// Integers are kept as integers while in the column. [`FieldData::to_f64`] rounds anything
/// above 2^53 to the nearest representable value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldData {
    UInt(Vec<u64>),
    Int(Vec<i64>),
    Float(Vec<f64>),
}

impl FieldData {
    pub fn len(&self) -> usize {
        match self {
            Self::UInt(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the column into floating point values. Integers above 2^53 lose their low bits.
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            Self::UInt(v) => v.iter().map(|x| *x as f64).collect(),
            Self::Int(v) => v.iter().map(|x| *x as f64).collect(),
            Self::Float(v) => v.clone(),
        }
    }
}

/// The full contents of an extracted data file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedData {
    /// Settings from the header, keys lower-cased
    pub settings: BTreeMap<String, String>,
    pub fields: Vec<FieldSpec>,
    pub data: BTreeMap<String, FieldData>,
}

impl ExtractedData {
    pub fn field(&self, name: &str) -> Option<&FieldData> {
        self.data.get(name)
    }

    /// Number of records in the data section
    pub fn n_records(&self) -> usize {
        match self.fields.first() {
            Some(spec) => self
                .data
                .get(&spec.name)
                .map(|col| col.len() / spec.repeats)
                .unwrap_or(0),
            None => 0,
        }
    }
}

/// Anything that can load an extracted data file.
///
/// A missing file must be reported as [`TrodesFileError::NotFound`] so that callers can tell
/// it apart from every other failure.
pub trait ExtractedDataReader {
    fn read(&self, path: &Path) -> Result<ExtractedData, TrodesFileError>;
}

impl<R: ExtractedDataReader + ?Sized> ExtractedDataReader for &R {
    fn read(&self, path: &Path) -> Result<ExtractedData, TrodesFileError> {
        (**self).read(path)
    }
}

/// Reads extracted data files from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct TrodesFileReader;

impl ExtractedDataReader for TrodesFileReader {
    fn read(&self, path: &Path) -> Result<ExtractedData, TrodesFileError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TrodesFileError::NotFound(path.to_path_buf()))
            }
            Err(e) => return Err(TrodesFileError::IOError(e)),
        };
        let mut reader = BufReader::new(file);

        let settings = read_settings(&mut reader)?;
        let fields = match settings.get(FIELDS_KEY) {
            Some(field_str) => parse_fields(field_str)?,
            None => return Err(TrodesFileError::MissingField(String::from(FIELDS_KEY))),
        };

        let mut buffer: Vec<u8> = Vec::new();
        reader.read_to_end(&mut buffer)?;
        let data = parse_records(&fields, &buffer)?;

        Ok(ExtractedData {
            settings,
            fields,
            data,
        })
    }
}

/// Read one header line, trimmed. Returns None at end of file.
fn read_header_line<R: BufRead>(reader: &mut R) -> Result<Option<String>, TrodesFileError> {
    let mut line: Vec<u8> = Vec::new();
    if reader.read_until(b'\n', &mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&line).trim().to_string()))
}

fn read_settings<R: BufRead>(reader: &mut R) -> Result<BTreeMap<String, String>, TrodesFileError> {
    match read_header_line(reader)? {
        Some(line) if line == START_SETTINGS => (),
        Some(line) => return Err(TrodesFileError::BadHeader(line)),
        None => return Err(TrodesFileError::BadHeader(String::from("empty file"))),
    }

    let mut settings = BTreeMap::new();
    loop {
        let line = match read_header_line(reader)? {
            Some(l) => l,
            None => {
                return Err(TrodesFileError::BadHeader(format!(
                    "no {END_SETTINGS} before end of file"
                )))
            }
        };
        if line == END_SETTINGS {
            break;
        }
        match line.split_once(SETTINGS_SEPARATOR) {
            Some((key, value)) => {
                settings.insert(key.to_lowercase(), value.to_string());
            }
            None => return Err(TrodesFileError::BadHeader(line)),
        }
    }
    Ok(settings)
}

/// Parse a Fields setting such as `<time uint32><data 2*int16>`
pub fn parse_fields(field_str: &str) -> Result<Vec<FieldSpec>, TrodesFileError> {
    let cleaned = field_str.replace("><", " ").replace(['<', '>'], " ");
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    if tokens.is_empty() || tokens.len() % 2 != 0 {
        return Err(TrodesFileError::BadFieldSpec(field_str.to_string()));
    }

    let mut fields = Vec::with_capacity(tokens.len() / 2);
    for pair in tokens.chunks_exact(2) {
        let (repeats, type_str) = match pair[1].split_once('*') {
            Some((count, kind)) => match count.parse::<usize>() {
                Ok(n) if n > 0 => (n, kind),
                _ => return Err(TrodesFileError::BadFieldSpec(pair[1].to_string())),
            },
            None => (1, pair[1]),
        };
        fields.push(FieldSpec {
            name: pair[0].to_string(),
            kind: FieldType::parse(type_str)?,
            repeats,
        });
    }
    Ok(fields)
}

fn parse_records(
    fields: &[FieldSpec],
    buffer: &[u8],
) -> Result<BTreeMap<String, FieldData>, TrodesFileError> {
    let record_size: usize = fields.iter().map(FieldSpec::record_bytes).sum();
    let remainder = buffer.len() % record_size;
    if remainder != 0 {
        return Err(TrodesFileError::TruncatedRecord(remainder, record_size));
    }

    let mut columns: Vec<FieldData> = fields.iter().map(|f| f.kind.empty_column()).collect();
    for record in buffer.chunks_exact(record_size) {
        let mut offset = 0;
        for (spec, column) in fields.iter().zip(columns.iter_mut()) {
            for _ in 0..spec.repeats {
                let bytes = &record[offset..offset + spec.kind.size()];
                push_value(column, spec.kind, bytes);
                offset += spec.kind.size();
            }
        }
    }

    Ok(fields
        .iter()
        .map(|f| f.name.clone())
        .zip(columns)
        .collect())
}

fn push_value(column: &mut FieldData, kind: FieldType, bytes: &[u8]) {
    match column {
        FieldData::UInt(v) => v.push(match kind {
            FieldType::UInt8 => bytes[0] as u64,
            FieldType::UInt16 => LittleEndian::read_u16(bytes) as u64,
            FieldType::UInt32 => LittleEndian::read_u32(bytes) as u64,
            _ => LittleEndian::read_u64(bytes),
        }),
        FieldData::Int(v) => v.push(match kind {
            FieldType::Int8 => bytes[0] as i8 as i64,
            FieldType::Int16 => LittleEndian::read_i16(bytes) as i64,
            FieldType::Int32 => LittleEndian::read_i32(bytes) as i64,
            _ => LittleEndian::read_i64(bytes),
        }),
        FieldData::Float(v) => v.push(match kind {
            FieldType::Float32 => LittleEndian::read_f32(bytes) as f64,
            _ => LittleEndian::read_f64(bytes),
        }),
    }
}

/// Writers for extracted data files, shared by the unit tests of the crate
#[cfg(test)]
pub(crate) mod fixtures {
    use byteorder::{LittleEndian, WriteBytesExt};
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;

    fn write_header(file: &mut File, fields: &str) {
        writeln!(file, "<Start settings>").unwrap();
        writeln!(file, "Description: test fixture").unwrap();
        writeln!(file, "Byte_order: little endian").unwrap();
        writeln!(file, "Fields: {fields}").unwrap();
        writeln!(file, "<End settings>").unwrap();
    }

    /// A cameraHWSync file with the given HWTimestamp column
    pub fn write_hw_sync(path: &Path, hw_timestamps: &[u64]) {
        let mut file = File::create(path).unwrap();
        write_header(
            &mut file,
            "<PosTimestamp uint32><HWframeCount uint32><HWTimestamp uint64>",
        );
        for (idx, ts) in hw_timestamps.iter().enumerate() {
            file.write_u32::<LittleEndian>(idx as u32 * 100).unwrap();
            file.write_u32::<LittleEndian>(idx as u32).unwrap();
            file.write_u64::<LittleEndian>(*ts).unwrap();
        }
    }

    /// A cameraHWFrameCount file with the given frameCount column
    pub fn write_frame_count(path: &Path, frame_counts: &[u32]) {
        let mut file = File::create(path).unwrap();
        write_header(&mut file, "<PosTimestamp uint32><frameCount uint32>");
        for (idx, count) in frame_counts.iter().enumerate() {
            file.write_u32::<LittleEndian>(idx as u32 * 100).unwrap();
            file.write_u32::<LittleEndian>(*count).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use byteorder::WriteBytesExt;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_parse_fields() {
        let fields = parse_fields("<time uint32><data 2*int16><value float64>").unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].name, "time");
        assert_eq!(fields[0].kind, FieldType::UInt32);
        assert_eq!(fields[1].repeats, 2);
        assert_eq!(fields[1].kind, FieldType::Int16);
        assert_eq!(fields[2].kind, FieldType::Float64);
    }

    #[test]
    fn test_parse_fields_rejects_bad_input() {
        assert!(matches!(
            parse_fields("<time>"),
            Err(TrodesFileError::BadFieldSpec(_))
        ));
        assert!(matches!(
            parse_fields("<time complex128>"),
            Err(TrodesFileError::UnsupportedType(_))
        ));
        assert!(matches!(
            parse_fields("<data 0*int16>"),
            Err(TrodesFileError::BadFieldSpec(_))
        ));
    }

    #[test]
    fn test_read_hw_sync() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cam.1.videoTimeStamps.cameraHWSync");
        let stamps = [1_565_000_000_123_456_789_u64, 1_565_000_000_156_789_012];
        write_hw_sync(&path, &stamps);

        let data = TrodesFileReader.read(&path).unwrap();
        assert_eq!(data.settings.get("byte_order").unwrap(), "little endian");
        assert_eq!(data.n_records(), 2);
        assert_eq!(
            data.field("HWTimestamp"),
            Some(&FieldData::UInt(stamps.to_vec()))
        );
        assert_eq!(
            data.field("HWframeCount"),
            Some(&FieldData::UInt(vec![0, 1]))
        );
    }

    #[test]
    fn test_read_repeated_signed_field() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("signed.dat");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "<Start settings>").unwrap();
        writeln!(file, "Fields: <time uint32><data 2*int16>").unwrap();
        writeln!(file, "<End settings>").unwrap();
        for (t, a, b) in [(10u32, -1i16, 2i16), (11, 3, -4)] {
            file.write_u32::<LittleEndian>(t).unwrap();
            file.write_i16::<LittleEndian>(a).unwrap();
            file.write_i16::<LittleEndian>(b).unwrap();
        }
        drop(file);

        let data = TrodesFileReader.read(&path).unwrap();
        assert_eq!(data.n_records(), 2);
        assert_eq!(data.field("data"), Some(&FieldData::Int(vec![-1, 2, 3, -4])));
        assert_eq!(data.field("time").unwrap().to_f64(), vec![10.0, 11.0]);
    }

    #[test]
    fn test_read_float_field() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("float.dat");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "<Start settings>").unwrap();
        writeln!(file, "Fields: <x float><y float32>").unwrap();
        writeln!(file, "<End settings>").unwrap();
        file.write_f64::<LittleEndian>(1.5).unwrap();
        file.write_f32::<LittleEndian>(-0.25).unwrap();
        drop(file);

        let data = TrodesFileReader.read(&path).unwrap();
        assert_eq!(data.fields[0].kind, FieldType::Float64);
        assert_eq!(data.fields[1].kind, FieldType::Float32);
        assert_eq!(data.n_records(), 1);
        assert_eq!(data.field("x"), Some(&FieldData::Float(vec![1.5])));
        assert_eq!(data.field("y"), Some(&FieldData::Float(vec![-0.25])));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.cameraHWSync");
        match TrodesFileReader.read(&path) {
            Err(TrodesFileError::NotFound(p)) => assert_eq!(p, path),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.dat");
        std::fs::write(&path, "not a settings block\n").unwrap();
        assert!(matches!(
            TrodesFileReader.read(&path),
            Err(TrodesFileError::BadHeader(_))
        ));

        std::fs::write(&path, "<Start settings>\nFields: <time uint32>\n").unwrap();
        assert!(matches!(
            TrodesFileReader.read(&path),
            Err(TrodesFileError::BadHeader(_))
        ));
    }

    #[test]
    fn test_missing_fields_setting() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nofields.dat");
        std::fs::write(&path, "<Start settings>\nDescription: x\n<End settings>\n").unwrap();
        assert!(matches!(
            TrodesFileReader.read(&path),
            Err(TrodesFileError::MissingField(_))
        ));
    }

    #[test]
    fn test_truncated_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.dat");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "<Start settings>").unwrap();
        writeln!(file, "Fields: <time uint32>").unwrap();
        writeln!(file, "<End settings>").unwrap();
        file.write_all(&[1, 0, 0, 0, 2, 0]).unwrap();
        drop(file);

        assert!(matches!(
            TrodesFileReader.read(&path),
            Err(TrodesFileError::TruncatedRecord(2, 4))
        ));
    }
}
