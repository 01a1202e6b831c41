mod file_reader;
mod range_reader;
mod s3_reader;

pub use file_reader::FileRangeReader;
pub use range_reader::{
    read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le, RangeReader,
};
pub use s3_reader::{create_s3_client, parse_s3_uri, S3RangeReader};
