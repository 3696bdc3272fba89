//! Reader for C3D motion-capture files: a 512-byte-block binary layout with
//! a two-word-per-field header, a group/parameter section, and interleaved
//! point + analog frame data. Only little-endian (Intel processor type)
//! files are accepted; integer point storage is scaled by the header scale
//! factor, a negative scale factor marks float storage.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail, ensure};
use byteorder::{ByteOrder, LittleEndian};
use memmap2::{Mmap, MmapOptions};

pub const BLOCK_SIZE: usize = 512;

const HEADER_MAGIC: u8 = 0x50;
const PROCESSOR_INTEL: u8 = 84;

#[derive(Debug, Clone, Copy)]
pub struct C3dHeader {
    /// Number of 3D points (markers) per frame.
    pub point_count: u16,
    /// Total analog samples stored per point frame (channels x per-frame rate).
    pub analog_per_frame: u16,
    pub first_frame: u16,
    pub last_frame: u16,
    pub max_interpolation_gap: u16,
    /// Point scale factor; negative means points are stored as floats.
    pub scale: f32,
    /// 1-indexed block number of the first data block.
    pub data_block: u16,
    /// Analog samples per channel per point frame.
    pub analog_samples_per_frame: u16,
    pub frame_rate: f32,
}

impl C3dHeader {
    pub fn uses_float_storage(&self) -> bool {
        self.scale < 0.0
    }

    pub fn frame_count(&self) -> usize {
        if self.last_frame < self.first_frame {
            return 0;
        }
        (self.last_frame - self.first_frame) as usize + 1
    }

    /// Stored values per frame: four words per point plus the analog block.
    fn words_per_frame(&self) -> usize {
        self.point_count as usize * 4 + self.analog_per_frame as usize
    }
}

/// One marker sample: millimetre coordinates plus the residual word. The
/// residual is carried through as-is for downstream consumers; this crate
/// never interprets it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct C3dPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub residual: f32,
}

impl C3dPoint {
    pub fn position(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct C3dFrame {
    pub points: Vec<C3dPoint>,
    pub analog: Vec<f32>,
}

/// One record from the parameter section. Groups carry a negative id and no
/// payload; parameters reference their group by its absolute id.
#[derive(Debug, Clone)]
pub struct ParameterRecord {
    pub group_id: i8,
    pub name: String,
    pub element_size: i8,
    pub dimensions: Vec<u8>,
    pub data: Vec<u8>,
}

impl ParameterRecord {
    pub fn as_f32(&self) -> Option<f32> {
        if self.element_size == 4 && self.data.len() >= 4 {
            Some(LittleEndian::read_f32(&self.data[..4]))
        } else {
            None
        }
    }

}

#[derive(Debug, Clone, Default)]
pub struct ParameterSection {
    groups: Vec<(i8, String)>,
    parameters: Vec<ParameterRecord>,
}

impl ParameterSection {
    /// Look up a parameter by group and parameter name, case-insensitive.
    pub fn get(&self, group: &str, name: &str) -> Option<&ParameterRecord> {
        let group_id = self
            .groups
            .iter()
            .find(|(_, group_name)| group_name.eq_ignore_ascii_case(group))
            .map(|(id, _)| *id)?;
        self.parameters
            .iter()
            .find(|param| param.group_id == group_id && param.name.eq_ignore_ascii_case(name))
    }

    pub fn parameters(&self) -> &[ParameterRecord] {
        &self.parameters
    }
}

/// A memory-mapped C3D file with a sequential frame cursor. Header and
/// parameters are decoded eagerly; frames are decoded on demand.
#[derive(Debug)]
pub struct C3dFile {
    path: PathBuf,
    mmap: Mmap,
    header: C3dHeader,
    parameters: ParameterSection,
    next_frame_index: usize,
}

impl C3dFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        let file = File::open(&path_buf)
            .with_context(|| format!("opening C3D file at {}", path_buf.display()))?;
        let mmap = unsafe { MmapOptions::new().map(&file) }
            .with_context(|| format!("memory-mapping C3D file {}", path_buf.display()))?;

        let (header, parameters) = parse_front_matter(&mmap)
            .with_context(|| format!("parsing C3D file {}", path_buf.display()))?;

        Ok(C3dFile {
            path: path_buf,
            mmap,
            header,
            parameters,
            next_frame_index: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &C3dHeader {
        &self.header
    }

    pub fn parameters(&self) -> &ParameterSection {
        &self.parameters
    }

    pub fn frame_count(&self) -> usize {
        self.header.frame_count()
    }

    pub fn rewind(&mut self) {
        self.next_frame_index = 0;
    }

    /// Decode the next frame in file order. Returns `Ok(None)` once every
    /// stored frame has been read.
    pub fn next_frame(&mut self) -> Result<Option<C3dFrame>> {
        if self.next_frame_index >= self.frame_count() {
            return Ok(None);
        }
        let frame = self.read_frame(self.next_frame_index)?;
        self.next_frame_index += 1;
        Ok(Some(frame))
    }

    /// Decode an arbitrary frame without touching the cursor.
    pub fn read_frame(&self, index: usize) -> Result<C3dFrame> {
        ensure!(
            index < self.frame_count(),
            "frame index {index} out of range (file has {} frames)",
            self.frame_count()
        );

        let header = &self.header;
        let value_size = if header.uses_float_storage() { 4 } else { 2 };
        let frame_bytes = header.words_per_frame() * value_size;
        let data_start = (header.data_block as usize - 1) * BLOCK_SIZE;
        let offset = data_start + index * frame_bytes;
        ensure!(
            offset + frame_bytes <= self.mmap.len(),
            "frame {index} extends past end of file"
        );
        let bytes = &self.mmap[offset..offset + frame_bytes];

        let point_scale = header.scale.abs();
        let mut points = Vec::with_capacity(header.point_count as usize);
        let mut cursor = 0usize;
        for _ in 0..header.point_count {
            let values = read_word_quad(bytes, &mut cursor, header.uses_float_storage());
            let [x, y, z, residual] = values;
            if header.uses_float_storage() {
                points.push(C3dPoint { x, y, z, residual });
            } else {
                points.push(C3dPoint {
                    x: x * point_scale,
                    y: y * point_scale,
                    z: z * point_scale,
                    residual,
                });
            }
        }

        let mut analog = Vec::with_capacity(header.analog_per_frame as usize);
        for _ in 0..header.analog_per_frame {
            analog.push(read_word(bytes, &mut cursor, header.uses_float_storage()));
        }

        Ok(C3dFrame { points, analog })
    }
}

fn read_word(bytes: &[u8], cursor: &mut usize, float_storage: bool) -> f32 {
    let value = if float_storage {
        LittleEndian::read_f32(&bytes[*cursor..*cursor + 4])
    } else {
        LittleEndian::read_i16(&bytes[*cursor..*cursor + 2]) as f32
    };
    *cursor += if float_storage { 4 } else { 2 };
    value
}

fn read_word_quad(bytes: &[u8], cursor: &mut usize, float_storage: bool) -> [f32; 4] {
    [
        read_word(bytes, cursor, float_storage),
        read_word(bytes, cursor, float_storage),
        read_word(bytes, cursor, float_storage),
        read_word(bytes, cursor, float_storage),
    ]
}

fn parse_front_matter(bytes: &[u8]) -> Result<(C3dHeader, ParameterSection)> {
    ensure!(
        bytes.len() >= BLOCK_SIZE,
        "C3D file shorter than one header block ({} bytes)",
        bytes.len()
    );

    let parameter_block = bytes[0];
    ensure!(
        bytes[1] == HEADER_MAGIC,
        "missing C3D magic byte (expected 0x{:02X}, found 0x{:02X})",
        HEADER_MAGIC,
        bytes[1]
    );
    ensure!(parameter_block >= 1, "parameter block pointer is zero");

    let header = C3dHeader {
        point_count: LittleEndian::read_u16(&bytes[2..4]),
        analog_per_frame: LittleEndian::read_u16(&bytes[4..6]),
        first_frame: LittleEndian::read_u16(&bytes[6..8]),
        last_frame: LittleEndian::read_u16(&bytes[8..10]),
        max_interpolation_gap: LittleEndian::read_u16(&bytes[10..12]),
        scale: LittleEndian::read_f32(&bytes[12..16]),
        data_block: LittleEndian::read_u16(&bytes[16..18]),
        analog_samples_per_frame: LittleEndian::read_u16(&bytes[18..20]),
        frame_rate: LittleEndian::read_f32(&bytes[20..24]),
    };

    ensure!(
        header.frame_rate > 0.0,
        "C3D header reports nonpositive frame rate {}",
        header.frame_rate
    );
    ensure!(header.data_block >= 1, "data block pointer is zero");
    ensure!(header.scale != 0.0, "point scale factor is zero");

    let parameters = parse_parameter_section(bytes, parameter_block as usize)
        .context("parsing parameter section")?;

    Ok((header, parameters))
}

fn parse_parameter_section(bytes: &[u8], parameter_block: usize) -> Result<ParameterSection> {
    let start = (parameter_block - 1) * BLOCK_SIZE;
    ensure!(
        start + 4 <= bytes.len(),
        "parameter section starts past end of file"
    );

    let processor = bytes[start + 3];
    ensure!(
        processor == PROCESSOR_INTEL,
        "unsupported processor type {processor} (only Intel/little-endian files are supported)"
    );

    let mut section = ParameterSection::default();
    let mut cursor = start + 4;

    loop {
        ensure!(
            cursor + 2 <= bytes.len(),
            "parameter record truncated at offset {cursor}"
        );
        let name_len = bytes[cursor] as i8;
        let group_id = bytes[cursor + 1] as i8;
        if name_len == 0 || group_id == 0 {
            break;
        }
        // A negative length only marks the record as locked.
        let name_len = name_len.unsigned_abs() as usize;
        cursor += 2;

        ensure!(
            cursor + name_len + 2 <= bytes.len(),
            "parameter name truncated at offset {cursor}"
        );
        let name = String::from_utf8_lossy(&bytes[cursor..cursor + name_len]).into_owned();
        cursor += name_len;

        // The stored offset counts from the byte after this 2-byte field to
        // the start of the next record.
        let next_offset = LittleEndian::read_u16(&bytes[cursor..cursor + 2]) as usize;
        cursor += 2;
        let record_tail = cursor + next_offset;

        if group_id < 0 {
            // Group record: description only. The id byte is stored negated,
            // so -128 has no valid positive counterpart.
            let Some(id) = group_id.checked_neg() else {
                bail!("parameter group id {group_id} out of range for '{name}'");
            };
            section.groups.push((id, name));
        } else {
            ensure!(
                cursor + 2 <= bytes.len(),
                "parameter layout truncated for '{name}'"
            );
            let element_size = bytes[cursor] as i8;
            let dimension_count = bytes[cursor + 1] as usize;
            cursor += 2;

            ensure!(
                cursor + dimension_count <= bytes.len(),
                "parameter dimensions truncated for '{name}'"
            );
            let dimensions = bytes[cursor..cursor + dimension_count].to_vec();
            cursor += dimension_count;

            let element_count: usize = dimensions.iter().map(|&dim| dim as usize).product();
            let data_len = element_count * element_size.unsigned_abs() as usize;
            ensure!(
                cursor + data_len <= bytes.len(),
                "parameter data truncated for '{name}'"
            );
            let data = bytes[cursor..cursor + data_len].to_vec();

            section.parameters.push(ParameterRecord {
                group_id,
                name,
                element_size,
                dimensions,
                data,
            });
        }

        if next_offset == 0 {
            break;
        }
        ensure!(
            record_tail > start && record_tail <= bytes.len(),
            "parameter record chain points outside the file"
        );
        cursor = record_tail;
    }

    Ok(section)
}


#[cfg(test)]
mod tests {
    use super::test_support::SyntheticC3d;
    use super::*;
    use std::io::Write;

    fn float_fixture() -> SyntheticC3d {
        SyntheticC3d {
            point_count: 2,
            analog_per_frame: 3,
            frame_rate: 30.0,
            scale: -1.0,
            frames: vec![
                (
                    vec![[1.0, 2.0, 3.0, 0.5], [4.0, 5.0, 6.0, 0.25]],
                    vec![0.1, 0.2, 0.3],
                ),
                (
                    vec![[1.5, 2.5, 3.5, 0.5], [4.5, 5.5, 6.5, 0.25]],
                    vec![0.4, 0.5, 0.6],
                ),
            ],
        }
    }

    fn open_from_bytes(bytes: &[u8]) -> C3dFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(bytes).expect("write fixture");
        file.flush().expect("flush fixture");
        C3dFile::open(file.path()).expect("open fixture")
    }

    #[test]
    fn parses_float_storage_header_and_frames() {
        let mut c3d = open_from_bytes(&float_fixture().build());
        assert_eq!(c3d.header().point_count, 2);
        assert_eq!(c3d.header().analog_per_frame, 3);
        assert!(c3d.header().uses_float_storage());
        assert_eq!(c3d.frame_count(), 2);
        assert!((c3d.header().frame_rate - 30.0).abs() < f32::EPSILON);

        let first = c3d.next_frame().expect("read").expect("frame present");
        assert_eq!(first.points[0].position(), [1.0, 2.0, 3.0]);
        assert_eq!(first.points[1].residual, 0.25);
        assert_eq!(first.analog, vec![0.1, 0.2, 0.3]);

        let second = c3d.next_frame().expect("read").expect("frame present");
        assert_eq!(second.points[1].position(), [4.5, 5.5, 6.5]);

        assert!(c3d.next_frame().expect("read").is_none());
        assert!(c3d.next_frame().expect("read").is_none());
    }

    #[test]
    fn integer_storage_applies_scale_factor() {
        let fixture = SyntheticC3d {
            point_count: 1,
            analog_per_frame: 0,
            frame_rate: 60.0,
            scale: 0.5,
            frames: vec![(vec![[10.0, -20.0, 30.0, 4.0]], vec![])],
        };
        let mut c3d = open_from_bytes(&fixture.build());
        assert!(!c3d.header().uses_float_storage());

        let frame = c3d.next_frame().expect("read").expect("frame present");
        assert_eq!(frame.points[0].position(), [5.0, -10.0, 15.0]);
    }

    #[test]
    fn rewind_restarts_the_cursor() {
        let mut c3d = open_from_bytes(&float_fixture().build());
        let first = c3d.next_frame().expect("read").expect("frame");
        while c3d.next_frame().expect("read").is_some() {}
        c3d.rewind();
        let again = c3d.next_frame().expect("read").expect("frame");
        assert_eq!(first, again);
    }

    #[test]
    fn exposes_parameter_records() {
        let c3d = open_from_bytes(&float_fixture().build());
        let rate = c3d
            .parameters()
            .get("POINT", "RATE")
            .expect("POINT:RATE present");
        assert_eq!(rate.as_f32(), Some(30.0));
        assert!(c3d.parameters().get("POINT", "MISSING").is_none());
        assert!(c3d.parameters().get("ANALOG", "RATE").is_none());
    }

    #[test]
    fn parses_front_matter_from_an_in_memory_image() {
        let bytes = float_fixture().build();
        let (header, parameters) = parse_front_matter(&bytes).expect("parse image");
        assert_eq!(header.point_count, 2);
        assert!(header.uses_float_storage());
        assert!(parameters.get("POINT", "RATE").is_some());
    }

    #[test]
    fn rejects_missing_magic_byte() {
        let mut bytes = float_fixture().build();
        bytes[1] = 0x00;
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(&bytes).expect("write fixture");
        let err = C3dFile::open(file.path()).expect_err("magic byte rejected");
        assert!(format!("{err:#}").contains("magic"));
    }

    #[test]
    fn rejects_big_endian_processor_type() {
        let mut bytes = float_fixture().build();
        bytes[BLOCK_SIZE + 3] = 85; // DEC
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(&bytes).expect("write fixture");
        let err = C3dFile::open(file.path()).expect_err("processor type rejected");
        assert!(format!("{err:#}").contains("processor"));
    }

    #[test]
    fn rejects_out_of_range_group_id() {
        let mut bytes = float_fixture().build();
        // First parameter record starts right after the processor byte; its
        // group-id byte sits at offset 5 of the parameter block.
        bytes[BLOCK_SIZE + 5] = 0x80;
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(&bytes).expect("write fixture");
        let err = C3dFile::open(file.path()).expect_err("group id rejected");
        assert!(format!("{err:#}").contains("group id"));
    }

    #[test]
    fn truncated_data_section_is_an_error() {
        let mut bytes = float_fixture().build();
        bytes.truncate(BLOCK_SIZE * 2 + 8);
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(&bytes).expect("write fixture");
        let mut c3d = C3dFile::open(file.path()).expect("header still parses");
        assert!(c3d.next_frame().is_err());
    }
}
