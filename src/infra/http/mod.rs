mod middleware;
mod public;

pub use middleware::{LoadMoreMode, LoadMoreTrace, REQUEST_ID_HEADER};
pub use public::{HttpState, build_router};

const DATASTAR_REQUEST_HEADER: &str = "datastar-request";
