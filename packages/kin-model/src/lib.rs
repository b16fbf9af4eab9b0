pub mod date_format;

mod attribute;
mod error;
mod index;
mod matcher;
mod model;
mod resolver;
mod value;

pub use attribute::{Attribute, AttributeType};
pub use error::{CoercionError, Error, Result};
pub use index::{Index, IndexField};
pub use matcher::{Matcher, Variable};
pub use model::Model;
pub use resolver::Resolver;
pub use value::{Value, ValueSet, is_blank};
