#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolver {
	pub name: String,
	/// Required attributes, sorted and distinct.
	pub attributes: Vec<String>,
	/// Confidence tier; higher is more trusted.
	pub weight: i32,
}
impl Resolver {
	pub fn new(name: &str, attributes: &[String], weight: i32) -> Self {
		let mut attributes = attributes.to_vec();

		attributes.sort();
		attributes.dedup();

		Self { name: name.to_string(), attributes, weight }
	}
}
