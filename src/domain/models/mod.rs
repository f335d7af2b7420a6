pub mod bucket;
pub mod export;
pub mod filter;
pub mod object;
pub mod upload;
pub mod view;

pub use bucket::*;
pub use export::*;
pub use filter::*;
pub use object::*;
pub use upload::*;
pub use view::*;
