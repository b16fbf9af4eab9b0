use serde::Serialize;
use serde_json::Value as JsonValue;

/// Backend-neutral boolean predicate tree.
///
/// `And` matches when every child matches, `Or` when any child matches, `Not` when no child
/// matches. An empty `Or` matches nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
	And(Vec<Expr>),
	Or(Vec<Expr>),
	Not(Vec<Expr>),
	Leaf(Leaf),
}
impl Expr {
	pub fn leaf(predicate: Predicate) -> Self {
		Self::Leaf(Leaf { predicate, tag: None })
	}

	pub fn tagged(predicate: Predicate, tag: impl Into<String>) -> Self {
		Self::Leaf(Leaf { predicate, tag: Some(tag.into()) })
	}

	pub fn exists(field: impl Into<String>) -> Self {
		Self::leaf(Predicate::Exists { field: field.into() })
	}

	pub fn ids<I, S>(values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self::leaf(Predicate::Ids { values: values.into_iter().map(Into::into).collect() })
	}

	/// Conjunction of `children`; `None` when there are none, the child itself when there is one.
	pub fn all(mut children: Vec<Expr>) -> Option<Self> {
		match children.len() {
			0 => None,
			1 => children.pop(),
			_ => Some(Self::And(children)),
		}
	}

	/// Disjunction of `children`; `None` when there are none, the child itself when there is one.
	pub fn any(mut children: Vec<Expr>) -> Option<Self> {
		match children.len() {
			0 => None,
			1 => children.pop(),
			_ => Some(Self::Or(children)),
		}
	}

	/// Every provenance tag in the tree, depth first.
	pub fn tags(&self) -> Vec<&str> {
		let mut out = Vec::new();

		self.collect_tags(&mut out);

		out
	}

	fn collect_tags<'a>(&'a self, out: &mut Vec<&'a str>) {
		match self {
			Self::And(children) | Self::Or(children) | Self::Not(children) => {
				for child in children {
					child.collect_tags(out);
				}
			},
			Self::Leaf(leaf) => {
				if let Some(tag) = leaf.tag.as_deref() {
					out.push(tag);
				}
			},
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leaf {
	pub predicate: Predicate,
	/// Provenance tag; unique within one compiled query.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
	/// A rendered matcher clause in the backend's query language.
	Clause(JsonValue),
	Exists { field: String },
	Ids { values: Vec<String> },
}
