pub mod article;
pub mod comment;
pub mod page;
pub mod user;

pub use article::*;
pub use comment::*;
pub use page::*;
pub use user::*;
