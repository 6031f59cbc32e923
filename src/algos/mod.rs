mod page_rank;
pub use page_rank::*;

mod sssp;
pub use sssp::*;
