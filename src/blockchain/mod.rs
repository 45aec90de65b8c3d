pub mod header;
pub mod stored;
pub mod work;

pub use header::{BlockHeader, HEADER_SIZE, Hash256};
pub use stored::StoredHeader;
pub use work::{CompactError, U256, U512, decode_compact, encode_compact, work_for_bits, work_for_target};
