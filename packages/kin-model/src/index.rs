#[derive(Debug, Clone)]
pub struct IndexField {
	/// Field name as the backend knows it, e.g. "name.keyword".
	pub name: String,
	/// `name` split on dots, used to read the field from `_source`.
	pub path: Vec<String>,
	/// `path` without its last segment. Multi-fields such as "name.keyword" are not
	/// present in `_source`, so harvesting falls back to the parent object.
	pub path_parent: Vec<String>,
	pub attribute: String,
	pub matcher: Option<String>,
}
impl IndexField {
	pub fn new(name: &str, attribute: &str, matcher: Option<&str>) -> Self {
		let path: Vec<String> = name.split('.').map(str::to_string).collect();
		let path_parent = path[..path.len().saturating_sub(1)].to_vec();

		Self {
			name: name.to_string(),
			path,
			path_parent,
			attribute: attribute.to_string(),
			matcher: matcher.map(str::to_string),
		}
	}
}

#[derive(Debug, Clone)]
pub struct Index {
	pub name: String,
	/// Sorted by field name.
	pub fields: Vec<IndexField>,
}
impl Index {
	pub fn fields_for<'a>(&'a self, attribute: &'a str) -> impl Iterator<Item = &'a IndexField> {
		self.fields.iter().filter(move |field| field.attribute == attribute)
	}

	/// Fields of `attribute` that can be queried, i.e. that have a matcher.
	pub fn matcher_fields_for<'a>(
		&'a self,
		attribute: &'a str,
	) -> impl Iterator<Item = &'a IndexField> {
		self.fields_for(attribute).filter(|field| field.matcher.is_some())
	}

	pub fn has_attribute(&self, attribute: &str) -> bool {
		self.fields_for(attribute).next().is_some()
	}

	pub fn field(&self, name: &str) -> Option<&IndexField> {
		self.fields.iter().find(|field| field.name == name)
	}
}
