//! Depth-first mapping of command and document trees onto graph nodes

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use serde::Serialize;
use tracing::{debug, error};
use crate::{Error, Result};
use crate::graph::{NodePath, Property, PropertyValue};
use crate::lexicon::{sql, vdb};
use crate::uow::UnitOfWork;
use super::SequenceOutcome;
use super::ast::*;
use super::types::{DataTypeName, DataTypeService};

/// A non-fatal finding recorded while sequencing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// Node under which the construct would have been placed
    pub path: NodePath,
    pub construct: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.path, self.construct, self.message)
    }
}

/// Sequences one extension kind.
///
/// Handlers build their nodes through the generator's public helpers so that naming,
/// metadata stamping and depth limits apply to them as to built-in constructs.
pub trait ExtensionHandler: Send + Sync {
    fn sequence(&self, generator: &mut NodeGenerator<'_>, uow: &mut UnitOfWork, node: &ExtensionNode) -> Result<()>;
}

/// Extension kinds known to a sequencer
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    handlers: HashMap<String, Arc<dyn ExtensionHandler>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for `kind`
    pub fn register(&mut self, kind: &str, handler: impl ExtensionHandler + 'static) {
        self.handlers.insert(kind.to_string(), Arc::new(handler));
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn ExtensionHandler>> {
        self.handlers.get(kind).cloned()
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

/// Creates one node of a fixed type per extension, with its attributes as properties
/// and its children beneath it
pub struct AttributeExtension {
    node_type: String,
}

impl AttributeExtension {
    pub fn new(node_type: &str) -> Self {
        Self {
            node_type: node_type.to_string(),
        }
    }
}

impl ExtensionHandler for AttributeExtension {
    fn sequence(&self, generator: &mut NodeGenerator<'_>, uow: &mut UnitOfWork, node: &ExtensionNode) -> Result<()> {
        let path = generator.create_node(uow, &self.node_type)?;
        for (name, value) in &node.attributes {
            generator.set_literal(uow, &path, name, value)?;
        }
        generator.visit_children(uow, &path, &node.kind, &node.children)
    }
}

fn flatten_literal(literal: &Literal, out: &mut Vec<PropertyValue>) {
    match literal {
        Literal::Boolean(v) => out.push(PropertyValue::Boolean(*v)),
        Literal::Integer(v) => out.push(PropertyValue::Long(*v)),
        Literal::Float(v) => out.push(PropertyValue::Double(*v)),
        Literal::Text(v) => out.push(PropertyValue::String(v.clone())),
        Literal::List(items) => items.iter().for_each(|item| flatten_literal(item, out)),
    }
}

/// Lists become multi-valued properties; nested lists are flattened
fn literal_property(literal: &Literal) -> Property {
    match literal {
        Literal::Boolean(v) => Property::from(*v),
        Literal::Integer(v) => Property::from(*v),
        Literal::Float(v) => Property::Single(PropertyValue::Double(*v)),
        Literal::Text(v) => Property::from(v.as_str()),
        Literal::List(_) => {
            let mut values = Vec::new();
            flatten_literal(literal, &mut values);
            Property::Multiple(values)
        }
    }
}

type Visit<'a, T> = fn(&mut NodeGenerator<'a>, &mut UnitOfWork, &T) -> Result<()>;

/// Visits a tree depth-first and emits a node subtree under a target parent.
///
/// A child node is named after the role it plays in its parent (`sql:select`,
/// `sql:criteria`, ...); a top-level node after its own type. Document nodes carry their
/// declared names. Every node is stamped with the metadata version.
///
/// Non-fatal findings accumulate as diagnostics. The first fatal error is recorded and
/// the rest of the traversal is skipped; nodes created up to that point stay in the
/// unit of work for the caller to roll back.
pub struct NodeGenerator<'a> {
    types: &'a dyn DataTypeService,
    extensions: &'a ExtensionRegistry,
    metadata_version: &'a str,
    max_depth: usize,
    depth: usize,
    parent: NodePath,
    reference: Option<String>,
    root: Option<NodePath>,
    diagnostics: Vec<Diagnostic>,
    error: Option<Error>,
}

impl<'a> NodeGenerator<'a> {
    pub const DEFAULT_MAX_DEPTH: usize = 256;

    pub fn new(parent: NodePath, types: &'a dyn DataTypeService, extensions: &'a ExtensionRegistry) -> Self {
        Self {
            types,
            extensions,
            metadata_version: crate::config::DEFAULT_METADATA_VERSION,
            max_depth: Self::DEFAULT_MAX_DEPTH,
            depth: 0,
            parent,
            reference: None,
            root: None,
            diagnostics: Vec::new(),
            error: None,
        }
    }

    pub fn metadata_version(mut self, version: &'a str) -> Self {
        self.metadata_version = version;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sequence `obj` under the current target. Does nothing once an error was recorded.
    pub fn visit(&mut self, uow: &mut UnitOfWork, obj: &LanguageObject) {
        if self.error_occurred() {
            return;
        }
        debug!(construct = obj.kind(), parent = %self.parent, "sequencing");
        if let Err(err) = self.walk(uow, obj) {
            self.set_error(err);
        }
    }

    pub fn error_occurred(&self) -> bool {
        self.error.is_some()
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// First node created under the target parent
    pub fn root(&self) -> Option<&NodePath> {
        self.root.as_ref()
    }

    pub fn into_outcome(self) -> SequenceOutcome {
        SequenceOutcome {
            root: self.root,
            diagnostics: self.diagnostics,
            error: self.error,
        }
    }

    fn set_error(&mut self, err: Error) {
        if self.error.is_none() {
            error!(error = %err, parent = %self.parent, "sequencing failed");
            self.error = Some(err);
        }
    }

    /// Record a non-fatal finding
    pub fn diagnose(&mut self, path: &NodePath, construct: &str, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            path: path.clone(),
            construct: construct.to_string(),
            message: message.into(),
        };
        debug!(%diagnostic, "sequencing diagnostic");
        self.diagnostics.push(diagnostic);
    }

    // ========== Node Helpers ==========

    /// Create a node of `node_type`, named by the current child role or by its type
    pub fn create_node(&mut self, uow: &mut UnitOfWork, node_type: &str) -> Result<NodePath> {
        let name = self.reference.clone().unwrap_or_else(|| node_type.to_string());
        let parent = self.parent.clone();
        self.create_at(uow, &parent, &name, node_type)
    }

    fn create_at(&mut self, uow: &mut UnitOfWork, parent: &NodePath, name: &str, node_type: &str) -> Result<NodePath> {
        let path = uow.create_node(parent, name, node_type)?;
        uow.set_property(&path, sql::METADATA_VERSION, self.metadata_version)?;
        if self.root.is_none() {
            self.root = Some(path.clone());
        }
        Ok(path)
    }

    /// Document nodes keep their declared names wherever they appear
    fn create_named(&mut self, uow: &mut UnitOfWork, name: &str, node_type: &str) -> Result<NodePath> {
        let parent = self.parent.clone();
        self.create_at(uow, &parent, name, node_type)
    }

    pub fn set_literal(&mut self, uow: &mut UnitOfWork, node: &NodePath, name: &str, value: &Literal) -> Result<()> {
        uow.set_property(node, name, literal_property(value))
    }

    fn set_opt(&mut self, uow: &mut UnitOfWork, node: &NodePath, name: &str, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) => uow.set_property(node, name, value),
            None => Ok(()),
        }
    }

    fn set_list(&mut self, uow: &mut UnitOfWork, node: &NodePath, name: &str, values: &[String]) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let values = values.iter().map(|v| PropertyValue::from(v.as_str())).collect::<Vec<_>>();
        uow.set_property(node, name, Property::Multiple(values))
    }

    /// Normalize and store a data type; unknown names fall back to OBJECT
    fn set_type(&mut self, uow: &mut UnitOfWork, node: &NodePath, raw: Option<&str>) -> Result<()> {
        let Some(raw) = raw else {
            return Ok(());
        };
        let name = match self.types.data_type_name(raw) {
            Some(name) => name,
            None => {
                self.diagnose(node, "typeName", format!("unknown data type '{}', using OBJECT", raw));
                DataTypeName::OBJECT
            }
        };
        uow.set_property(node, sql::TYPE_CLASS, name.to_string())
    }

    fn document_properties(
        &mut self,
        uow: &mut UnitOfWork,
        node: &NodePath,
        properties: &BTreeMap<String, String>,
    ) -> Result<()> {
        for (key, value) in properties {
            let property = self.create_at(uow, node, key, vdb::PROPERTY)?;
            uow.set_property(&property, vdb::VALUE, value.as_str())?;
        }
        Ok(())
    }

    // ========== Traversal ==========

    /// Run `f` with `parent`/`reference` as the placement context for new nodes
    fn within(&mut self, parent: &NodePath, reference: &str, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(Error::Sequencing(format!(
                "tree nesting exceeds {} levels below {}",
                self.max_depth, parent
            )));
        }
        let saved_parent = std::mem::replace(&mut self.parent, parent.clone());
        let saved_reference = self.reference.replace(reference.to_string());
        self.depth += 1;

        let result = f(self);

        self.depth -= 1;
        self.parent = saved_parent;
        self.reference = saved_reference;
        result
    }

    fn child(
        &mut self,
        uow: &mut UnitOfWork,
        node: &NodePath,
        reference: &str,
        obj: Option<&LanguageObject>,
    ) -> Result<()> {
        match obj {
            Some(obj) => self.within(node, reference, |g| g.walk(uow, obj)),
            None => Ok(()),
        }
    }

    /// Sequence `objs` in source order under `node`, each named by `reference`
    pub fn visit_children(
        &mut self,
        uow: &mut UnitOfWork,
        node: &NodePath,
        reference: &str,
        objs: &[LanguageObject],
    ) -> Result<()> {
        for obj in objs {
            self.child(uow, node, reference, Some(obj))?;
        }
        Ok(())
    }

    fn typed<T>(
        &mut self,
        uow: &mut UnitOfWork,
        node: &NodePath,
        reference: &str,
        value: Option<&T>,
        visit: Visit<'a, T>,
    ) -> Result<()> {
        match value {
            Some(value) => self.within(node, reference, |g| visit(g, uow, value)),
            None => Ok(()),
        }
    }

    fn typed_all<T>(
        &mut self,
        uow: &mut UnitOfWork,
        node: &NodePath,
        reference: &str,
        values: &[T],
        visit: Visit<'a, T>,
    ) -> Result<()> {
        for value in values {
            self.typed(uow, node, reference, Some(value), visit)?;
        }
        Ok(())
    }

    fn walk(&mut self, uow: &mut UnitOfWork, obj: &LanguageObject) -> Result<()> {
        match obj {
            LanguageObject::Query(o) => self.query(uow, o),
            LanguageObject::SetQuery(o) => self.set_query(uow, o),
            LanguageObject::Insert(o) => self.insert(uow, o),
            LanguageObject::Update(o) => self.update(uow, o),
            LanguageObject::Delete(o) => self.delete(uow, o),
            LanguageObject::StoredProcedure(o) => self.stored_procedure(uow, o),
            LanguageObject::Select(o) => self.select(uow, o),
            LanguageObject::From(o) => self.from(uow, o),
            LanguageObject::UnaryFromClause(o) => self.unary_from_clause(uow, o),
            LanguageObject::JoinPredicate(o) => self.join_predicate(uow, o),
            LanguageObject::SubqueryFromClause(o) => self.subquery_from_clause(uow, o),
            LanguageObject::GroupBy(o) => self.group_by(uow, o),
            LanguageObject::OrderBy(o) => self.order_by(uow, o),
            LanguageObject::Limit(o) => self.limit(uow, o),
            LanguageObject::CompareCriteria(o) => self.compare_criteria(uow, o),
            LanguageObject::CompoundCriteria(o) => self.compound_criteria(uow, o),
            LanguageObject::NotCriteria(o) => self.not_criteria(uow, o),
            LanguageObject::IsNullCriteria(o) => self.is_null_criteria(uow, o),
            LanguageObject::BetweenCriteria(o) => self.between_criteria(uow, o),
            LanguageObject::MatchCriteria(o) => self.match_criteria(uow, o),
            LanguageObject::SetCriteria(o) => self.set_criteria(uow, o),
            LanguageObject::ExistsCriteria(o) => self.exists_criteria(uow, o),
            LanguageObject::ElementSymbol(o) => self.element_symbol(uow, o),
            LanguageObject::GroupSymbol(o) => self.group_symbol(uow, o),
            LanguageObject::AliasSymbol(o) => self.alias_symbol(uow, o),
            LanguageObject::ExpressionSymbol(o) => self.expression_symbol(uow, o),
            LanguageObject::MultipleElementSymbol(o) => self.multiple_element_symbol(uow, o),
            LanguageObject::AggregateSymbol(o) => self.aggregate_symbol(uow, o),
            LanguageObject::Constant(o) => self.constant(uow, o),
            LanguageObject::Function(o) => self.function(uow, o),
            LanguageObject::Reference(o) => self.reference(uow, o),
            LanguageObject::ScalarSubquery(o) => self.scalar_subquery(uow, o),
            LanguageObject::SearchedCase(o) => self.searched_case(uow, o),
            LanguageObject::Vdb(o) => self.vdb(uow, o),
            LanguageObject::Model(o) => self.model(uow, o),
            LanguageObject::ModelSource(o) => self.model_source(uow, o),
            LanguageObject::Extension(o) => self.extension(uow, o),
        }
    }

    fn extension(&mut self, uow: &mut UnitOfWork, ext: &ExtensionNode) -> Result<()> {
        match self.extensions.get(&ext.kind) {
            Some(handler) => handler.sequence(self, uow, ext),
            None => {
                let parent = self.parent.clone();
                self.diagnose(&parent, &ext.kind, "no handler registered, construct skipped");
                Ok(())
            }
        }
    }

    // ========== Commands ==========

    fn query(&mut self, uow: &mut UnitOfWork, q: &Query) -> Result<()> {
        let node = self.create_node(uow, sql::QUERY)?;
        self.typed(uow, &node, sql::REF_SELECT, q.select.as_ref(), Self::select)?;
        self.typed(uow, &node, sql::REF_INTO, q.into.as_ref(), Self::into)?;
        self.typed(uow, &node, sql::REF_FROM, q.from.as_ref(), Self::from)?;
        self.child(uow, &node, sql::REF_CRITERIA, q.criteria.as_deref())?;
        self.typed(uow, &node, sql::REF_GROUP_BY, q.group_by.as_ref(), Self::group_by)?;
        self.child(uow, &node, sql::REF_HAVING, q.having.as_deref())?;
        self.typed(uow, &node, sql::REF_ORDER_BY, q.order_by.as_ref(), Self::order_by)?;
        self.typed(uow, &node, sql::REF_LIMIT, q.limit.as_ref(), Self::limit)?;
        self.typed(uow, &node, sql::REF_OPTION, q.option.as_ref(), Self::option)
    }

    fn set_query(&mut self, uow: &mut UnitOfWork, q: &SetQuery) -> Result<()> {
        let node = self.create_node(uow, sql::SET_QUERY)?;
        uow.set_property(&node, sql::OPERATION, q.operation.as_str())?;
        uow.set_property(&node, sql::ALL, q.all)?;
        self.child(uow, &node, sql::REF_LEFT_QUERY, Some(&q.left))?;
        self.child(uow, &node, sql::REF_RIGHT_QUERY, Some(&q.right))?;
        self.typed(uow, &node, sql::REF_ORDER_BY, q.order_by.as_ref(), Self::order_by)?;
        self.typed(uow, &node, sql::REF_LIMIT, q.limit.as_ref(), Self::limit)?;
        self.typed(uow, &node, sql::REF_OPTION, q.option.as_ref(), Self::option)
    }

    fn insert(&mut self, uow: &mut UnitOfWork, q: &Insert) -> Result<()> {
        let node = self.create_node(uow, sql::INSERT)?;
        self.typed(uow, &node, sql::REF_GROUP, Some(&q.group), Self::group_symbol)?;
        self.typed_all(uow, &node, sql::REF_VARIABLES, &q.variables, Self::element_symbol)?;
        self.visit_children(uow, &node, sql::REF_VALUES, &q.values)?;
        self.child(uow, &node, sql::REF_QUERY_EXPRESSION, q.query_expression.as_deref())?;
        self.typed(uow, &node, sql::REF_OPTION, q.option.as_ref(), Self::option)
    }

    fn update(&mut self, uow: &mut UnitOfWork, q: &Update) -> Result<()> {
        let node = self.create_node(uow, sql::UPDATE)?;
        self.typed(uow, &node, sql::REF_GROUP, Some(&q.group), Self::group_symbol)?;
        self.typed_all(uow, &node, sql::REF_CHANGE_LIST, &q.changes, Self::set_clause)?;
        self.child(uow, &node, sql::REF_CRITERIA, q.criteria.as_deref())?;
        self.typed(uow, &node, sql::REF_OPTION, q.option.as_ref(), Self::option)
    }

    fn delete(&mut self, uow: &mut UnitOfWork, q: &Delete) -> Result<()> {
        let node = self.create_node(uow, sql::DELETE)?;
        self.typed(uow, &node, sql::REF_GROUP, Some(&q.group), Self::group_symbol)?;
        self.child(uow, &node, sql::REF_CRITERIA, q.criteria.as_deref())?;
        self.typed(uow, &node, sql::REF_OPTION, q.option.as_ref(), Self::option)
    }

    fn stored_procedure(&mut self, uow: &mut UnitOfWork, q: &StoredProcedure) -> Result<()> {
        let node = self.create_node(uow, sql::STORED_PROCEDURE)?;
        uow.set_property(&node, sql::PROCEDURE_NAME, q.procedure_name.as_str())?;
        self.typed_all(uow, &node, sql::REF_PARAMETERS, &q.parameters, Self::sp_parameter)?;
        self.typed(uow, &node, sql::REF_OPTION, q.option.as_ref(), Self::option)
    }

    fn sp_parameter(&mut self, uow: &mut UnitOfWork, p: &SpParameter) -> Result<()> {
        let node = self.create_node(uow, sql::SP_PARAMETER)?;
        self.set_opt(uow, &node, sql::NAME, p.name.as_deref().filter(|n| !n.is_empty()))?;
        uow.set_property(&node, sql::PARAMETER_TYPE, p.direction.as_str())?;
        self.set_type(uow, &node, p.type_name.as_deref())?;
        uow.set_property(&node, sql::INDEX, p.index)?;
        self.child(uow, &node, sql::REF_EXPRESSION, p.expression.as_deref())
    }

    // ========== Clauses ==========

    fn select(&mut self, uow: &mut UnitOfWork, s: &Select) -> Result<()> {
        let node = self.create_node(uow, sql::SELECT)?;
        uow.set_property(&node, sql::DISTINCT, s.distinct)?;
        self.visit_children(uow, &node, sql::REF_SYMBOLS, &s.symbols)
    }

    fn from(&mut self, uow: &mut UnitOfWork, f: &FromClause) -> Result<()> {
        let node = self.create_node(uow, sql::FROM)?;
        self.visit_children(uow, &node, sql::REF_CLAUSES, &f.clauses)
    }

    fn unary_from_clause(&mut self, uow: &mut UnitOfWork, c: &UnaryFromClause) -> Result<()> {
        let node = self.create_node(uow, sql::UNARY_FROM_CLAUSE)?;
        uow.set_property(&node, sql::OPTIONAL, c.optional)?;
        uow.set_property(&node, sql::MAKE_DEPENDENT, c.make_dependent)?;
        self.typed(uow, &node, sql::REF_GROUP, Some(&c.group), Self::group_symbol)
    }

    fn join_predicate(&mut self, uow: &mut UnitOfWork, j: &JoinPredicate) -> Result<()> {
        let node = self.create_node(uow, sql::JOIN_PREDICATE)?;
        uow.set_property(&node, sql::JOIN_TYPE, j.join_type.as_str())?;
        self.child(uow, &node, sql::REF_LEFT_CLAUSE, Some(&j.left))?;
        self.child(uow, &node, sql::REF_RIGHT_CLAUSE, Some(&j.right))?;
        self.visit_children(uow, &node, sql::REF_JOIN_CRITERIA, &j.criteria)
    }

    fn subquery_from_clause(&mut self, uow: &mut UnitOfWork, c: &SubqueryFromClause) -> Result<()> {
        let node = self.create_node(uow, sql::SUBQUERY_FROM_CLAUSE)?;
        uow.set_property(&node, sql::NAME, c.name.as_str())?;
        uow.set_property(&node, sql::OPTIONAL, c.optional)?;
        self.child(uow, &node, sql::REF_COMMAND, Some(&c.command))
    }

    fn group_by(&mut self, uow: &mut UnitOfWork, g: &GroupBy) -> Result<()> {
        let node = self.create_node(uow, sql::GROUP_BY)?;
        uow.set_property(&node, sql::ROLLUP, g.rollup)?;
        self.visit_children(uow, &node, sql::REF_SYMBOLS, &g.symbols)
    }

    fn order_by(&mut self, uow: &mut UnitOfWork, o: &OrderBy) -> Result<()> {
        let node = self.create_node(uow, sql::ORDER_BY)?;
        self.typed_all(uow, &node, sql::REF_ORDER_BY_ITEMS, &o.items, Self::order_by_item)
    }

    fn order_by_item(&mut self, uow: &mut UnitOfWork, item: &OrderByItem) -> Result<()> {
        let node = self.create_node(uow, sql::ORDER_BY_ITEM)?;
        uow.set_property(&node, sql::ASCENDING, item.ascending)?;
        self.set_opt(uow, &node, sql::NULL_ORDERING, item.null_ordering.map(|n| n.as_str()))?;
        self.child(uow, &node, sql::REF_SYMBOL, Some(&item.symbol))
    }

    fn limit(&mut self, uow: &mut UnitOfWork, l: &Limit) -> Result<()> {
        let node = self.create_node(uow, sql::LIMIT)?;
        uow.set_property(&node, sql::IMPLICIT, l.implicit)?;
        self.child(uow, &node, sql::REF_OFFSET, l.offset.as_deref())?;
        self.child(uow, &node, sql::REF_ROW_LIMIT, l.row_limit.as_deref())
    }

    fn into(&mut self, uow: &mut UnitOfWork, i: &IntoClause) -> Result<()> {
        let node = self.create_node(uow, sql::INTO)?;
        self.typed(uow, &node, sql::REF_GROUP, Some(&i.group), Self::group_symbol)
    }

    fn option(&mut self, uow: &mut UnitOfWork, o: &CommandOption) -> Result<()> {
        let node = self.create_node(uow, sql::OPTION)?;
        uow.set_property(&node, sql::NO_CACHE, o.no_cache)?;
        self.set_list(uow, &node, sql::NO_CACHE_GROUPS, &o.no_cache_groups)?;
        self.set_list(uow, &node, sql::DEPENDENT_GROUPS, &o.dependent_groups)?;
        self.set_list(uow, &node, sql::NOT_DEPENDENT_GROUPS, &o.not_dependent_groups)
    }

    fn set_clause(&mut self, uow: &mut UnitOfWork, c: &SetClause) -> Result<()> {
        let node = self.create_node(uow, sql::SET_CLAUSE)?;
        self.typed(uow, &node, sql::REF_SYMBOL, Some(&c.symbol), Self::element_symbol)?;
        self.child(uow, &node, sql::REF_EXPRESSION, Some(&c.value))
    }

    // ========== Criteria ==========

    fn compare_criteria(&mut self, uow: &mut UnitOfWork, c: &CompareCriteria) -> Result<()> {
        let node = self.create_node(uow, sql::COMPARE_CRITERIA)?;
        uow.set_property(&node, sql::OPERATOR, c.operator.as_str())?;
        uow.set_property(&node, sql::OPTIONAL, c.optional)?;
        self.child(uow, &node, sql::REF_LEFT_EXPRESSION, Some(&c.left))?;
        self.child(uow, &node, sql::REF_RIGHT_EXPRESSION, Some(&c.right))
    }

    fn compound_criteria(&mut self, uow: &mut UnitOfWork, c: &CompoundCriteria) -> Result<()> {
        let node = self.create_node(uow, sql::COMPOUND_CRITERIA)?;
        uow.set_property(&node, sql::OPERATOR, c.operator.as_str())?;
        self.visit_children(uow, &node, sql::REF_CRITERIA, &c.criteria)
    }

    fn not_criteria(&mut self, uow: &mut UnitOfWork, c: &NotCriteria) -> Result<()> {
        let node = self.create_node(uow, sql::NOT_CRITERIA)?;
        self.child(uow, &node, sql::REF_CRITERIA, Some(&c.criteria))
    }

    fn is_null_criteria(&mut self, uow: &mut UnitOfWork, c: &IsNullCriteria) -> Result<()> {
        let node = self.create_node(uow, sql::IS_NULL_CRITERIA)?;
        uow.set_property(&node, sql::NEGATED, c.negated)?;
        self.child(uow, &node, sql::REF_EXPRESSION, Some(&c.expression))
    }

    fn between_criteria(&mut self, uow: &mut UnitOfWork, c: &BetweenCriteria) -> Result<()> {
        let node = self.create_node(uow, sql::BETWEEN_CRITERIA)?;
        uow.set_property(&node, sql::NEGATED, c.negated)?;
        self.child(uow, &node, sql::REF_EXPRESSION, Some(&c.expression))?;
        self.child(uow, &node, sql::REF_LOWER_EXPRESSION, Some(&c.lower))?;
        self.child(uow, &node, sql::REF_UPPER_EXPRESSION, Some(&c.upper))
    }

    fn match_criteria(&mut self, uow: &mut UnitOfWork, c: &MatchCriteria) -> Result<()> {
        let node = self.create_node(uow, sql::MATCH_CRITERIA)?;
        uow.set_property(&node, sql::NEGATED, c.negated)?;
        uow.set_property(&node, sql::MATCH_MODE, c.mode.as_str())?;
        self.set_opt(uow, &node, sql::ESCAPE_CHAR, c.escape_char.as_deref())?;
        self.child(uow, &node, sql::REF_LEFT_EXPRESSION, Some(&c.left))?;
        self.child(uow, &node, sql::REF_RIGHT_EXPRESSION, Some(&c.right))
    }

    fn set_criteria(&mut self, uow: &mut UnitOfWork, c: &SetCriteria) -> Result<()> {
        let node = self.create_node(uow, sql::SET_CRITERIA)?;
        uow.set_property(&node, sql::NEGATED, c.negated)?;
        self.child(uow, &node, sql::REF_EXPRESSION, Some(&c.expression))?;
        self.visit_children(uow, &node, sql::REF_VALUES, &c.values)
    }

    fn exists_criteria(&mut self, uow: &mut UnitOfWork, c: &ExistsCriteria) -> Result<()> {
        let node = self.create_node(uow, sql::EXISTS_CRITERIA)?;
        uow.set_property(&node, sql::NEGATED, c.negated)?;
        self.child(uow, &node, sql::REF_COMMAND, Some(&c.command))
    }

    // ========== Symbols and Expressions ==========

    fn element_symbol(&mut self, uow: &mut UnitOfWork, s: &ElementSymbol) -> Result<()> {
        let node = self.create_node(uow, sql::ELEMENT_SYMBOL)?;
        uow.set_property(&node, sql::NAME, s.name.as_str())?;
        self.set_opt(uow, &node, sql::OUTPUT_NAME, s.output_name.as_deref())?;
        self.set_type(uow, &node, s.type_name.as_deref())?;
        self.typed(uow, &node, sql::REF_GROUP, s.group.as_ref(), Self::group_symbol)
    }

    fn group_symbol(&mut self, uow: &mut UnitOfWork, s: &GroupSymbol) -> Result<()> {
        let node = self.create_node(uow, sql::GROUP_SYMBOL)?;
        uow.set_property(&node, sql::NAME, s.name.as_str())?;
        self.set_opt(uow, &node, sql::DEFINITION, s.definition.as_deref())
    }

    fn alias_symbol(&mut self, uow: &mut UnitOfWork, s: &AliasSymbol) -> Result<()> {
        let node = self.create_node(uow, sql::ALIAS_SYMBOL)?;
        uow.set_property(&node, sql::NAME, s.name.as_str())?;
        self.child(uow, &node, sql::REF_SYMBOL, Some(&s.symbol))
    }

    fn expression_symbol(&mut self, uow: &mut UnitOfWork, s: &ExpressionSymbol) -> Result<()> {
        let node = self.create_node(uow, sql::EXPRESSION_SYMBOL)?;
        uow.set_property(&node, sql::NAME, s.name.as_str())?;
        self.child(uow, &node, sql::REF_EXPRESSION, Some(&s.expression))
    }

    fn multiple_element_symbol(&mut self, uow: &mut UnitOfWork, s: &MultipleElementSymbol) -> Result<()> {
        let node = self.create_node(uow, sql::MULTIPLE_ELEMENT_SYMBOL)?;
        self.typed(uow, &node, sql::REF_GROUP, s.group.as_ref(), Self::group_symbol)
    }

    fn aggregate_symbol(&mut self, uow: &mut UnitOfWork, s: &AggregateSymbol) -> Result<()> {
        let node = self.create_node(uow, sql::AGGREGATE_SYMBOL)?;
        uow.set_property(&node, sql::NAME, s.name.as_str())?;
        uow.set_property(&node, sql::DISTINCT, s.distinct)?;
        self.set_type(uow, &node, s.type_name.as_deref())?;
        self.visit_children(uow, &node, sql::REF_ARGS, &s.args)?;
        self.child(uow, &node, sql::REF_CONDITION, s.condition.as_deref())?;
        self.typed(uow, &node, sql::REF_ORDER_BY, s.order_by.as_ref(), Self::order_by)
    }

    fn constant(&mut self, uow: &mut UnitOfWork, c: &Constant) -> Result<()> {
        let node = self.create_node(uow, sql::CONSTANT)?;
        self.set_type(uow, &node, c.type_name.as_deref())?;
        if let Some(value) = &c.value {
            uow.set_property(&node, sql::MULTI_VALUED, matches!(value, Literal::List(_)))?;
            self.set_literal(uow, &node, sql::VALUE, value)?;
        }
        Ok(())
    }

    fn function(&mut self, uow: &mut UnitOfWork, f: &Function) -> Result<()> {
        let node = self.create_node(uow, sql::FUNCTION)?;
        uow.set_property(&node, sql::NAME, f.name.as_str())?;
        uow.set_property(&node, sql::IMPLICIT, f.implicit)?;
        self.set_type(uow, &node, f.type_name.as_deref())?;
        self.visit_children(uow, &node, sql::REF_ARGS, &f.args)
    }

    fn reference(&mut self, uow: &mut UnitOfWork, r: &Reference) -> Result<()> {
        let node = self.create_node(uow, sql::REFERENCE)?;
        uow.set_property(&node, sql::INDEX, r.index)?;
        self.set_type(uow, &node, r.type_name.as_deref())
    }

    fn scalar_subquery(&mut self, uow: &mut UnitOfWork, s: &ScalarSubquery) -> Result<()> {
        let node = self.create_node(uow, sql::SCALAR_SUBQUERY)?;
        self.set_type(uow, &node, s.type_name.as_deref())?;
        self.child(uow, &node, sql::REF_COMMAND, Some(&s.command))
    }

    fn searched_case(&mut self, uow: &mut UnitOfWork, c: &SearchedCase) -> Result<()> {
        if c.when.len() != c.then.len() {
            return Err(Error::Sequencing(format!(
                "searched CASE has {} WHEN but {} THEN expressions",
                c.when.len(),
                c.then.len()
            )));
        }
        let node = self.create_node(uow, sql::SEARCHED_CASE_EXPRESSION)?;
        self.set_type(uow, &node, c.type_name.as_deref())?;
        self.visit_children(uow, &node, sql::REF_WHEN, &c.when)?;
        self.visit_children(uow, &node, sql::REF_THEN, &c.then)?;
        self.child(uow, &node, sql::REF_ELSE, c.else_expression.as_deref())
    }

    // ========== Documents ==========

    fn vdb(&mut self, uow: &mut UnitOfWork, doc: &VdbDocument) -> Result<()> {
        let node = self.create_named(uow, &doc.name, vdb::VIRTUAL_DATABASE)?;
        uow.set_property(&node, vdb::NAME, doc.name.as_str())?;
        uow.set_property(&node, vdb::VERSION, doc.version)?;
        self.set_opt(uow, &node, vdb::DESCRIPTION, doc.description.as_deref())?;
        self.set_opt(uow, &node, vdb::CONNECTION_TYPE, doc.connection_type.as_deref())?;
        self.document_properties(uow, &node, &doc.properties)?;
        self.typed_all(uow, &node, vdb::MODELS, &doc.models, Self::model)
    }

    fn model(&mut self, uow: &mut UnitOfWork, doc: &ModelDocument) -> Result<()> {
        let node = self.create_named(uow, &doc.name, vdb::MODEL)?;
        uow.set_property(&node, vdb::MODEL_TYPE, doc.model_type.as_str())?;
        uow.set_property(&node, vdb::VISIBLE, doc.visible)?;
        self.set_opt(uow, &node, vdb::DESCRIPTION, doc.description.as_deref())?;
        self.set_opt(uow, &node, vdb::METADATA_TYPE, doc.metadata_type.as_deref())?;
        self.set_opt(uow, &node, vdb::MODEL_DEFINITION, doc.definition.as_deref())?;
        if doc.definition.is_some() && doc.metadata_type.is_none() {
            self.diagnose(&node, "model", "model definition without a metadata type");
        }
        self.document_properties(uow, &node, &doc.properties)?;
        self.typed_all(uow, &node, vdb::SOURCES, &doc.sources, Self::model_source)
    }

    fn model_source(&mut self, uow: &mut UnitOfWork, doc: &ModelSourceDocument) -> Result<()> {
        let node = self.create_named(uow, &doc.name, vdb::MODEL_SOURCE)?;
        self.set_opt(uow, &node, vdb::SOURCE_TRANSLATOR, doc.translator.as_deref())?;
        self.set_opt(uow, &node, vdb::SOURCE_JNDI_NAME, doc.jndi_name.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphStore;
    use crate::sequencer::types::StandardTypes;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> LanguageObject {
        serde_json::from_value(value).unwrap()
    }

    fn select_a_from_t() -> LanguageObject {
        tree(json!({
            "node": "query",
            "select": { "symbols": [
                { "node": "elementSymbol", "name": "a", "typeName": "varchar" }
            ]},
            "from": { "clauses": [
                { "node": "unaryFromClause", "group": { "name": "t" } }
            ]},
            "criteria": {
                "node": "compareCriteria",
                "operator": "=",
                "left": { "node": "elementSymbol", "name": "a" },
                "right": { "node": "constant", "value": 1, "typeName": "integer" }
            }
        }))
    }

    fn generate(uow: &mut UnitOfWork, obj: &LanguageObject, registry: &ExtensionRegistry) -> SequenceOutcome {
        let mut generator = NodeGenerator::new(NodePath::root(), &StandardTypes, registry);
        generator.visit(uow, obj);
        generator.into_outcome()
    }

    fn p(s: &str) -> NodePath {
        NodePath::parse(s).unwrap()
    }

    #[test]
    fn test_query_structure() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("seq").unwrap();
        let outcome = generate(&mut uow, &select_a_from_t(), &ExtensionRegistry::new());

        assert!(outcome.error.is_none());
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(outcome.root, Some(p("/sql:query")));

        let snap = uow.snapshot(&p("/sql:query")).unwrap();
        let names: Vec<&str> = snap.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["sql:select", "sql:from", "sql:criteria"]);

        let symbol = snap.child("sql:select").unwrap().child("sql:symbols").unwrap();
        assert_eq!(symbol.node_type, sql::ELEMENT_SYMBOL);
        assert_eq!(symbol.property(sql::TYPE_CLASS).and_then(|p| p.as_str()), Some("STRING"));

        let criteria = snap.child("sql:criteria").unwrap();
        assert_eq!(criteria.property(sql::OPERATOR).and_then(|p| p.as_str()), Some("EQ"));
        let constant = criteria.child("sql:rightExpression").unwrap();
        assert_eq!(constant.property(sql::VALUE).and_then(|p| p.as_long()), Some(1));
        assert_eq!(constant.property(sql::MULTI_VALUED).and_then(|p| p.as_bool()), Some(false));

        let group = snap
            .child("sql:from")
            .and_then(|f| f.child("sql:clauses"))
            .and_then(|c| c.child("sql:group"))
            .unwrap();
        assert_eq!(group.property(sql::NAME).and_then(|p| p.as_str()), Some("t"));
    }

    #[test]
    fn test_every_node_carries_metadata_version() {
        fn check(snapshot: &crate::graph::NodeSnapshot) {
            assert!(snapshot.property(sql::METADATA_VERSION).is_some(), "{} unstamped", snapshot.name);
            snapshot.children.iter().for_each(check);
        }

        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("seq").unwrap();
        generate(&mut uow, &select_a_from_t(), &ExtensionRegistry::new());
        check(&uow.snapshot(&p("/sql:query")).unwrap());
    }

    #[test]
    fn test_symbols_keep_source_order() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("seq").unwrap();
        let obj = tree(json!({
            "node": "select",
            "symbols": [
                { "node": "elementSymbol", "name": "z" },
                { "node": "elementSymbol", "name": "a" },
                { "node": "elementSymbol", "name": "m" }
            ]
        }));
        generate(&mut uow, &obj, &ExtensionRegistry::new());

        let snap = uow.snapshot(&p("/sql:select")).unwrap();
        let names: Vec<(&str, Option<&str>)> = snap
            .children
            .iter()
            .map(|c| (c.name.as_str(), c.property(sql::NAME).and_then(|p| p.as_str())))
            .collect();
        assert_eq!(
            names,
            vec![
                ("sql:symbols", Some("z")),
                ("sql:symbols[2]", Some("a")),
                ("sql:symbols[3]", Some("m"))
            ]
        );
    }

    #[test]
    fn test_unknown_type_falls_back_to_object() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("seq").unwrap();
        let obj = tree(json!({ "node": "elementSymbol", "name": "g", "typeName": "hyperloglog" }));
        let outcome = generate(&mut uow, &obj, &ExtensionRegistry::new());

        assert!(outcome.error.is_none());
        assert_eq!(outcome.diagnostics.len(), 1);
        let value = uow.property(&p("/sql:elementSymbol"), sql::TYPE_CLASS).unwrap();
        assert_eq!(value.and_then(|v| v.as_str().map(String::from)).as_deref(), Some("OBJECT"));
    }

    #[test]
    fn test_unregistered_extension_is_a_diagnostic() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("seq").unwrap();
        let obj = tree(json!({
            "node": "select",
            "symbols": [
                { "node": "extension", "kind": "acme:windowFunction" },
                { "node": "elementSymbol", "name": "after" }
            ]
        }));
        let outcome = generate(&mut uow, &obj, &ExtensionRegistry::new());

        assert!(outcome.error.is_none());
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].construct, "acme:windowFunction");
        assert_eq!(uow.children(&p("/sql:select")).unwrap().len(), 1);
    }

    #[test]
    fn test_registered_extension_builds_nodes() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("seq").unwrap();
        let mut registry = ExtensionRegistry::new();
        registry.register("acme:hint", AttributeExtension::new("acme:hint"));

        let obj = tree(json!({
            "node": "extension",
            "kind": "acme:hint",
            "attributes": { "level": 3, "targets": ["a", "b"] },
            "children": [ { "node": "constant", "value": true } ]
        }));
        let outcome = generate(&mut uow, &obj, &registry);

        assert!(outcome.error.is_none());
        let snap = uow.snapshot(&p("/acme:hint")).unwrap();
        assert_eq!(snap.property("level").and_then(|v| v.as_long()), Some(3));
        assert_eq!(snap.property("targets").map(|v| v.values().len()), Some(2));
        assert_eq!(snap.children[0].name, "acme:hint");
        assert_eq!(snap.children[0].node_type, sql::CONSTANT);
    }

    struct FailingHandler;

    impl ExtensionHandler for FailingHandler {
        fn sequence(&self, _: &mut NodeGenerator<'_>, _: &mut UnitOfWork, node: &ExtensionNode) -> Result<()> {
            Err(Error::Sequencing(format!("cannot sequence {}", node.kind)))
        }
    }

    #[test]
    fn test_fatal_error_stops_traversal() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("seq").unwrap();
        let mut registry = ExtensionRegistry::new();
        registry.register("acme:broken", FailingHandler);

        let obj = tree(json!({
            "node": "select",
            "symbols": [
                { "node": "elementSymbol", "name": "before" },
                { "node": "extension", "kind": "acme:broken" },
                { "node": "elementSymbol", "name": "after" }
            ]
        }));
        let mut generator = NodeGenerator::new(NodePath::root(), &StandardTypes, &registry);
        generator.visit(&mut uow, &obj);
        assert!(generator.error_occurred());

        // further visits are ignored once an error is recorded
        generator.visit(&mut uow, &select_a_from_t());
        let outcome = generator.into_outcome();

        assert!(matches!(outcome.error, Some(Error::Sequencing(_))));
        assert_eq!(uow.children(&p("/sql:select")).unwrap().len(), 1);
        assert!(!uow.exists(&p("/sql:query")).unwrap());
    }

    #[test]
    fn test_depth_limit_is_fatal() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("seq").unwrap();
        let mut nested = json!({ "node": "constant", "value": 1 });
        for _ in 0..10 {
            nested = json!({ "node": "notCriteria", "criteria": nested });
        }
        let registry = ExtensionRegistry::new();
        let mut generator = NodeGenerator::new(NodePath::root(), &StandardTypes, &registry).max_depth(5);
        generator.visit(&mut uow, &tree(nested));
        assert!(matches!(generator.error(), Some(Error::Sequencing(_))));
    }

    #[test]
    fn test_mismatched_case_is_fatal() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("seq").unwrap();
        let obj = tree(json!({
            "node": "searchedCase",
            "when": [ { "node": "constant", "value": true } ],
            "then": []
        }));
        let outcome = generate(&mut uow, &obj, &ExtensionRegistry::new());
        assert!(matches!(outcome.error, Some(Error::Sequencing(_))));
    }

    #[test]
    fn test_list_constant_is_multi_valued() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("seq").unwrap();
        let obj = tree(json!({ "node": "constant", "value": [1, 2, 3], "typeName": "integer[]" }));
        generate(&mut uow, &obj, &ExtensionRegistry::new());

        let node = p("/sql:constant");
        let value = uow.property(&node, sql::VALUE).unwrap().unwrap();
        assert!(value.is_multiple());
        assert_eq!(value.values().len(), 3);
        let type_class = uow.string_property(&node, sql::TYPE_CLASS).unwrap();
        assert_eq!(type_class.as_deref(), Some("INTEGER_ARRAY"));
    }

    #[test]
    fn test_null_constant_writes_no_value() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("seq").unwrap();
        let obj = tree(json!({ "node": "constant" }));
        generate(&mut uow, &obj, &ExtensionRegistry::new());
        assert_eq!(uow.property(&p("/sql:constant"), sql::VALUE).unwrap(), None);
    }

    #[test]
    fn test_vdb_document() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("seq").unwrap();
        let obj = tree(json!({
            "node": "vdb",
            "name": "Portfolio",
            "version": 2,
            "properties": { "UseConnectorMetadata": "true" },
            "models": [{
                "name": "Accounts",
                "metadataType": "DDL",
                "definition": "CREATE FOREIGN TABLE account (id integer);",
                "sources": [ { "name": "pg1", "translator": "postgresql", "jndiName": "java:/pg1" } ]
            }]
        }));
        let outcome = generate(&mut uow, &obj, &ExtensionRegistry::new());
        assert!(outcome.error.is_none());
        assert_eq!(outcome.root, Some(p("/Portfolio")));

        let model = p("/Portfolio/Accounts");
        assert_eq!(uow.node_type(&model).unwrap().as_deref(), Some(vdb::MODEL));
        assert_eq!(
            uow.string_property(&model, vdb::MODEL_TYPE).unwrap().as_deref(),
            Some("PHYSICAL")
        );
        let source = p("/Portfolio/Accounts/pg1");
        assert_eq!(
            uow.string_property(&source, vdb::SOURCE_TRANSLATOR).unwrap().as_deref(),
            Some("postgresql")
        );
        let property = p("/Portfolio/UseConnectorMetadata");
        assert_eq!(uow.string_property(&property, vdb::VALUE).unwrap().as_deref(), Some("true"));
    }
}
