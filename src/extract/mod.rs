//! Record extraction from listing markup
//!
//! - `record`: the applicant record and its field helpers
//! - `ids`: detail-locator id scanning
//! - `rows`: row-pairing extraction of full records

mod ids;
mod record;
mod rows;

pub use ids::{detail_id, extract_detail_ids, leading_detail_id};
pub(crate) use record::non_empty;
pub use record::{combine_program, ApplicantRecord};
pub use rows::{RecordExtractor, MIN_PRIMARY_CELLS};
