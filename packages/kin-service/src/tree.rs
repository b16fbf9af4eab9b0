use std::collections::BTreeMap;

use kin_model::{Index, Model, Resolver, ValueSet};
use kin_search::{Expr, Predicate};

use crate::{
	Error, Result,
	input::{Frontier, ResolutionInput},
	provenance::TagSequence,
	template,
};

/// Whether `resolver` can be queried against `index` with the values in `frontier`.
///
/// Every attribute needs a known value and at least one field in the index with a matcher.
pub fn can_query(index: &Index, frontier: &Frontier, resolver: &Resolver) -> bool {
	resolver.attributes.iter().all(|attribute| {
		frontier.get(attribute).is_some_and(|values| !values.is_empty())
			&& index.matcher_fields_for(attribute).next().is_some()
	})
}

/// Builds the predicates of one query against one index.
///
/// Tags are drawn from a single sequence, so every tagged leaf of the query is unique even when
/// the same attribute predicate appears in several branches.
pub(crate) struct PredicateBuilder<'a> {
	model: &'a Model,
	index: &'a Index,
	input: &'a ResolutionInput,
	tags: TagSequence,
}
impl<'a> PredicateBuilder<'a> {
	pub(crate) fn new(model: &'a Model, index: &'a Index, input: &'a ResolutionInput) -> Self {
		Self { model, index, input, tags: TagSequence::new() }
	}

	/// Disjunction of one rendered clause per (matcher field, value) pair.
	///
	/// `None` when the attribute has no queryable field in the index or no usable value.
	pub(crate) fn attribute(
		&mut self,
		attribute: &str,
		values: &ValueSet,
		tagged: bool,
	) -> Result<Option<Expr>> {
		let model = self.model;
		let index = self.index;
		let mut leaves = Vec::new();

		for field in index.matcher_fields_for(attribute) {
			let Some(matcher_name) = field.matcher.as_deref() else { continue };
			let Some(matcher) = model.matcher(matcher_name) else {
				return Err(Error::Validation {
					message: format!(
						"Field '{}' of index '{}' references unknown matcher '{matcher_name}'.",
						field.name, index.name
					),
				});
			};
			let params = template::merged_params(model, self.input, attribute, matcher);

			for value in values.iter() {
				let Some(clause) = template::render(matcher, &field.name, value, &params)? else {
					continue;
				};
				let leaf = if tagged {
					let tag = self.tags.tag(attribute, &field.name, matcher_name, value);

					Expr::tagged(Predicate::Clause(clause), tag)
				} else {
					Expr::leaf(Predicate::Clause(clause))
				};

				leaves.push(leaf);
			}
		}

		Ok(Expr::any(leaves))
	}

	/// Combined predicate of every queryable resolver, gated by weight.
	///
	/// Resolvers are grouped into tiers by weight and each tier is compiled into an attribute
	/// trie. A lower tier only matches documents that, for every resolver of a higher tier,
	/// either carry none of that resolver's fields or also match it.
	pub(crate) fn resolvers(
		&mut self,
		frontier: &Frontier,
		resolvers: &[&Resolver],
	) -> Result<Option<Expr>> {
		let mut tiers: BTreeMap<i32, Vec<&Resolver>> = BTreeMap::new();

		for resolver in resolvers {
			if can_query(self.index, frontier, resolver) {
				tiers.entry(resolver.weight).or_default().push(*resolver);
			}
		}

		let mut higher: Vec<&Resolver> = Vec::new();
		let mut branches = Vec::new();

		for (_, tier) in tiers.into_iter().rev() {
			let trie = ResolverTrie::build(&tier);

			if let Some(tree) = self.children(&trie, 0, frontier)? {
				let mut parts = vec![tree];

				for resolver in &higher {
					parts.push(self.gate(frontier, resolver)?);
				}

				branches.extend(Expr::all(parts));
			}

			higher.extend(tier);
		}

		Ok(Expr::any(branches))
	}

	fn children(
		&mut self,
		trie: &ResolverTrie,
		node: usize,
		frontier: &Frontier,
	) -> Result<Option<Expr>> {
		let mut branches = Vec::new();

		for &child in &trie.nodes[node].children {
			if let Some(branch) = self.node(trie, child, frontier)? {
				branches.push(branch);
			}
		}

		Ok(Expr::any(branches))
	}

	fn node(&mut self, trie: &ResolverTrie, node: usize, frontier: &Frontier) -> Result<Option<Expr>> {
		let current = &trie.nodes[node];
		let Some(values) = frontier.get(&current.attribute) else { return Ok(None) };
		let Some(own) = self.attribute(&current.attribute, values, true)? else {
			return Ok(None);
		};

		// A resolver ends here, so its own attribute is sufficient.
		if current.terminal || current.children.is_empty() {
			return Ok(Some(own));
		}

		Ok(self.children(trie, node, frontier)?.map(|rest| Expr::And(vec![own, rest])))
	}

	/// `NOT (any field of the resolver exists) OR (the resolver matches)`.
	fn gate(&mut self, frontier: &Frontier, resolver: &Resolver) -> Result<Expr> {
		let index = self.index;
		let fields = resolver
			.attributes
			.iter()
			.flat_map(|attribute| index.fields_for(attribute))
			.map(|field| Expr::exists(field.name.clone()))
			.collect::<Vec<_>>();
		let absent = Expr::Not(fields);
		let mut clauses = Vec::new();

		for attribute in &resolver.attributes {
			let predicate = match frontier.get(attribute) {
				Some(values) => self.attribute(attribute, values, true)?,
				None => None,
			};
			let Some(predicate) = predicate else { return Ok(absent) };

			clauses.push(predicate);
		}

		Ok(match Expr::all(clauses) {
			Some(matches) => Expr::Or(vec![absent, matches]),
			None => absent,
		})
	}
}

#[derive(Debug, Default)]
struct TrieNode {
	attribute: String,
	/// Some resolver's attribute path ends at this node.
	terminal: bool,
	children: Vec<usize>,
}

/// Resolvers of one tier sharing attribute prefixes. Node 0 is the root.
#[derive(Debug)]
struct ResolverTrie {
	nodes: Vec<TrieNode>,
}
impl ResolverTrie {
	/// Inserts each resolver's attributes ordered by how many resolvers of the tier use them
	/// (descending, then by name), so common attributes end up near the root.
	fn build(resolvers: &[&Resolver]) -> Self {
		let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

		for resolver in resolvers {
			for attribute in &resolver.attributes {
				*counts.entry(attribute.as_str()).or_default() += 1;
			}
		}

		let mut trie = Self { nodes: vec![TrieNode::default()] };

		for resolver in resolvers {
			let mut attributes = resolver.attributes.iter().map(String::as_str).collect::<Vec<_>>();

			attributes.sort_by(|a, b| counts[b].cmp(&counts[a]).then_with(|| a.cmp(b)));
			trie.insert(&attributes);
		}

		trie
	}

	fn insert(&mut self, attributes: &[&str]) {
		let mut current = 0;

		for attribute in attributes {
			let existing = self.nodes[current]
				.children
				.iter()
				.copied()
				.find(|&child| self.nodes[child].attribute == *attribute);

			current = match existing {
				Some(child) => child,
				None => {
					let child = self.nodes.len();

					self.nodes.push(TrieNode { attribute: attribute.to_string(), ..Default::default() });
					self.nodes[current].children.push(child);

					child
				},
			};
		}

		self.nodes[current].terminal = true;
	}
}
