//! Round-trip properties across type classifications and endianness
//! settings (spec §8 "Round-trip properties").

use csp::context::{CommonContext, DataContext, DeserializeContext};
use csp::error::CspError;
use csp::flags::{CommonFlags, DataFlags};
use csp::header::MessageType;
use csp::id::Id;
use csp::io::{read_primitive, write_primitive, SliceReader};
use csp::serializable::Serializable;

#[derive(Debug, PartialEq)]
struct Point {
    x: i32,
    y: i32,
}

impl Serializable for Point {
    const TYPE_ID: Id = Id::new(100, 0);
    const LATEST_VERSION: u32 = 1;
    const ORIGIN_VERSION: u32 = 1;

    fn serialize_body(
        &self,
        w: &mut dyn csp::io::ByteWriter,
        ctx: &mut csp::context::SerializeContext,
    ) -> csp::error::CspResult<()> {
        write_primitive(w, self.x, ctx.common.endian_mismatch())?;
        write_primitive(w, self.y, ctx.common.endian_mismatch())
    }

    fn deserialize_body(
        r: &mut dyn csp::io::ByteReader,
        ctx: &mut DeserializeContext,
    ) -> csp::error::CspResult<Self> {
        Ok(Point {
            x: read_primitive(r, ctx.data.common.endian_mismatch())?,
            y: read_primitive(r, ctx.data.common.endian_mismatch())?,
        })
    }
}

#[test]
fn arithmetic_round_trips_at_matching_endianness() {
    let bytes = Point { x: -4, y: 9 }.serialize(1).unwrap();
    let decoded = Point::deserialize(&bytes).unwrap();
    assert_eq!(decoded, Point { x: -4, y: 9 });
}

#[test]
fn big_endian_header_encodes_value_bytes_in_order() {
    // Concrete scenario 1 from spec §6: serializing 0x11223344 under
    // bigEndianFormat=true on a little-endian host reverses the bytes.
    let mut ctx: csp::context::SerializeContext = DataContext::new(
        CommonContext::new(1, MessageType::Data, CommonFlags::BIG_ENDIAN_FORMAT),
        DataFlags::empty(),
    );
    let mut buf = Vec::new();
    write_primitive(&mut buf, 0x1122_3344u32, ctx.common.endian_mismatch()).unwrap();
    ctx.set_interface_version(1);
    assert_eq!(buf, vec![0x11, 0x22, 0x33, 0x44]);
}

#[test]
fn empty_vec_emits_only_size_prefix() {
    let mut ctx = DataContext::new(
        CommonContext::new(1, MessageType::Data, CommonFlags::empty()),
        DataFlags::empty(),
    );
    let mut buf = Vec::new();
    csp::body::serialize_vec(&mut buf, &Vec::<u8>::new(), &mut ctx, |w, v: &u8, _| {
        write_primitive(w, *v, false)
    })
    .unwrap();
    assert_eq!(buf, vec![0u8; 8]);
}

#[test]
fn endian_mismatch_errors_for_non_tolerant_type_under_mismatch() {
    #[derive(Clone, Copy)]
    struct NonReversible;
    impl csp::io::Primitive for NonReversible {
        const SIZE: usize = 1;
        const REVERSIBLE: bool = false;
        fn to_le_array(self) -> [u8; 8] {
            [0; 8]
        }
        fn from_le_array(_bytes: &[u8]) -> Self {
            NonReversible
        }
        fn swap_bytes(self) -> Self {
            self
        }
    }

    let mut buf = Vec::new();
    let err = write_primitive(&mut buf, NonReversible, true).unwrap_err();
    assert!(matches!(
        err,
        CspError::NotSupportedSerializationSettingsForStruct { .. }
    ));
}

#[test]
fn reading_past_available_bytes_overflows() {
    let buf = vec![1u8, 2];
    let mut r = SliceReader::new(&buf);
    let err = read_primitive::<u64>(&mut r, false).unwrap_err();
    assert!(matches!(err, CspError::Overflow { .. }));
}

