//! Abstract command and document trees handed to the sequencer
//!
//! Trees are produced by a [`CommandParser`](super::CommandParser) and are read-only
//! during sequencing. Positions whose grammar fixes the construct (a query's `SELECT`,
//! an insert's target group) are typed fields; positions that accept any expression,
//! criteria or from-clause hold a boxed [`LanguageObject`].

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

/// Every construct the sequencer knows how to map onto graph nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "camelCase")]
pub enum LanguageObject {
    // commands
    Query(Query),
    SetQuery(SetQuery),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    StoredProcedure(StoredProcedure),

    // clauses
    Select(Select),
    From(FromClause),
    UnaryFromClause(UnaryFromClause),
    JoinPredicate(JoinPredicate),
    SubqueryFromClause(SubqueryFromClause),
    GroupBy(GroupBy),
    OrderBy(OrderBy),
    Limit(Limit),

    // criteria
    CompareCriteria(CompareCriteria),
    CompoundCriteria(CompoundCriteria),
    NotCriteria(NotCriteria),
    IsNullCriteria(IsNullCriteria),
    BetweenCriteria(BetweenCriteria),
    MatchCriteria(MatchCriteria),
    SetCriteria(SetCriteria),
    ExistsCriteria(ExistsCriteria),

    // symbols and expressions
    ElementSymbol(ElementSymbol),
    GroupSymbol(GroupSymbol),
    AliasSymbol(AliasSymbol),
    ExpressionSymbol(ExpressionSymbol),
    MultipleElementSymbol(MultipleElementSymbol),
    AggregateSymbol(AggregateSymbol),
    Constant(Constant),
    Function(Function),
    Reference(Reference),
    ScalarSubquery(ScalarSubquery),
    SearchedCase(SearchedCase),

    // documents
    Vdb(VdbDocument),
    Model(ModelDocument),
    ModelSource(ModelSourceDocument),

    /// A construct handled by a registered extension handler
    Extension(ExtensionNode),
}

impl LanguageObject {
    /// The tag used in serialized trees and diagnostics
    pub fn kind(&self) -> &str {
        match self {
            LanguageObject::Query(_) => "query",
            LanguageObject::SetQuery(_) => "setQuery",
            LanguageObject::Insert(_) => "insert",
            LanguageObject::Update(_) => "update",
            LanguageObject::Delete(_) => "delete",
            LanguageObject::StoredProcedure(_) => "storedProcedure",
            LanguageObject::Select(_) => "select",
            LanguageObject::From(_) => "from",
            LanguageObject::UnaryFromClause(_) => "unaryFromClause",
            LanguageObject::JoinPredicate(_) => "joinPredicate",
            LanguageObject::SubqueryFromClause(_) => "subqueryFromClause",
            LanguageObject::GroupBy(_) => "groupBy",
            LanguageObject::OrderBy(_) => "orderBy",
            LanguageObject::Limit(_) => "limit",
            LanguageObject::CompareCriteria(_) => "compareCriteria",
            LanguageObject::CompoundCriteria(_) => "compoundCriteria",
            LanguageObject::NotCriteria(_) => "notCriteria",
            LanguageObject::IsNullCriteria(_) => "isNullCriteria",
            LanguageObject::BetweenCriteria(_) => "betweenCriteria",
            LanguageObject::MatchCriteria(_) => "matchCriteria",
            LanguageObject::SetCriteria(_) => "setCriteria",
            LanguageObject::ExistsCriteria(_) => "existsCriteria",
            LanguageObject::ElementSymbol(_) => "elementSymbol",
            LanguageObject::GroupSymbol(_) => "groupSymbol",
            LanguageObject::AliasSymbol(_) => "aliasSymbol",
            LanguageObject::ExpressionSymbol(_) => "expressionSymbol",
            LanguageObject::MultipleElementSymbol(_) => "multipleElementSymbol",
            LanguageObject::AggregateSymbol(_) => "aggregateSymbol",
            LanguageObject::Constant(_) => "constant",
            LanguageObject::Function(_) => "function",
            LanguageObject::Reference(_) => "reference",
            LanguageObject::ScalarSubquery(_) => "scalarSubquery",
            LanguageObject::SearchedCase(_) => "searchedCase",
            LanguageObject::Vdb(_) => "vdb",
            LanguageObject::Model(_) => "model",
            LanguageObject::ModelSource(_) => "modelSource",
            LanguageObject::Extension(ext) => &ext.kind,
        }
    }
}

/// A literal attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<Literal>),
}

// ========== Commands ==========

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Query {
    pub select: Option<Select>,
    pub into: Option<IntoClause>,
    pub from: Option<FromClause>,
    pub criteria: Option<Box<LanguageObject>>,
    pub group_by: Option<GroupBy>,
    pub having: Option<Box<LanguageObject>>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<Limit>,
    pub option: Option<CommandOption>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SetOperation {
    Union,
    Intersect,
    Except,
}

impl SetOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetOperation::Union => "UNION",
            SetOperation::Intersect => "INTERSECT",
            SetOperation::Except => "EXCEPT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetQuery {
    pub operation: SetOperation,
    #[serde(default)]
    pub all: bool,
    pub left: Box<LanguageObject>,
    pub right: Box<LanguageObject>,
    #[serde(default)]
    pub order_by: Option<OrderBy>,
    #[serde(default)]
    pub limit: Option<Limit>,
    #[serde(default)]
    pub option: Option<CommandOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insert {
    pub group: GroupSymbol,
    #[serde(default)]
    pub variables: Vec<ElementSymbol>,
    #[serde(default)]
    pub values: Vec<LanguageObject>,
    #[serde(default)]
    pub query_expression: Option<Box<LanguageObject>>,
    #[serde(default)]
    pub option: Option<CommandOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    pub group: GroupSymbol,
    #[serde(default)]
    pub changes: Vec<SetClause>,
    #[serde(default)]
    pub criteria: Option<Box<LanguageObject>>,
    #[serde(default)]
    pub option: Option<CommandOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delete {
    pub group: GroupSymbol,
    #[serde(default)]
    pub criteria: Option<Box<LanguageObject>>,
    #[serde(default)]
    pub option: Option<CommandOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredProcedure {
    pub procedure_name: String,
    #[serde(default)]
    pub parameters: Vec<SpParameter>,
    #[serde(default)]
    pub option: Option<CommandOption>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParameterDirection {
    #[default]
    In,
    Out,
    InOut,
    Return,
    ResultSet,
}

impl ParameterDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterDirection::In => "IN",
            ParameterDirection::Out => "OUT",
            ParameterDirection::InOut => "IN_OUT",
            ParameterDirection::Return => "RETURN",
            ParameterDirection::ResultSet => "RESULT_SET",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpParameter {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub direction: ParameterDirection,
    #[serde(default)]
    pub type_name: Option<String>,
    pub index: i64,
    #[serde(default)]
    pub expression: Option<Box<LanguageObject>>,
}

// ========== Clauses ==========

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Select {
    pub distinct: bool,
    pub symbols: Vec<LanguageObject>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FromClause {
    pub clauses: Vec<LanguageObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnaryFromClause {
    pub group: GroupSymbol,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub make_dependent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinKind {
    #[default]
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
    Cross,
    Semi,
    AntiSemi,
    Union,
}

impl JoinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::LeftOuter => "LEFT_OUTER",
            JoinKind::RightOuter => "RIGHT_OUTER",
            JoinKind::FullOuter => "FULL_OUTER",
            JoinKind::Cross => "CROSS",
            JoinKind::Semi => "SEMI",
            JoinKind::AntiSemi => "ANTI_SEMI",
            JoinKind::Union => "UNION",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPredicate {
    #[serde(default)]
    pub join_type: JoinKind,
    pub left: Box<LanguageObject>,
    pub right: Box<LanguageObject>,
    #[serde(default)]
    pub criteria: Vec<LanguageObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubqueryFromClause {
    pub name: String,
    pub command: Box<LanguageObject>,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupBy {
    pub rollup: bool,
    pub symbols: Vec<LanguageObject>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderBy {
    pub items: Vec<OrderByItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NullOrdering {
    First,
    Last,
}

impl NullOrdering {
    pub fn as_str(&self) -> &'static str {
        match self {
            NullOrdering::First => "FIRST",
            NullOrdering::Last => "LAST",
        }
    }
}

fn ascending_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderByItem {
    pub symbol: Box<LanguageObject>,
    #[serde(default = "ascending_default")]
    pub ascending: bool,
    #[serde(default)]
    pub null_ordering: Option<NullOrdering>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Limit {
    pub offset: Option<Box<LanguageObject>>,
    pub row_limit: Option<Box<LanguageObject>>,
    pub implicit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntoClause {
    pub group: GroupSymbol,
}

/// `OPTION` clause hints
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommandOption {
    pub no_cache: bool,
    pub no_cache_groups: Vec<String>,
    pub dependent_groups: Vec<String>,
    pub not_dependent_groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetClause {
    pub symbol: ElementSymbol,
    pub value: Box<LanguageObject>,
}

// ========== Criteria ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompareOperator {
    #[serde(alias = "=")]
    Eq,
    #[serde(alias = "<>", alias = "!=")]
    Ne,
    #[serde(alias = "<")]
    Lt,
    #[serde(alias = ">")]
    Gt,
    #[serde(alias = "<=")]
    Le,
    #[serde(alias = ">=")]
    Ge,
}

impl CompareOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOperator::Eq => "EQ",
            CompareOperator::Ne => "NE",
            CompareOperator::Lt => "LT",
            CompareOperator::Gt => "GT",
            CompareOperator::Le => "LE",
            CompareOperator::Ge => "GE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareCriteria {
    pub operator: CompareOperator,
    pub left: Box<LanguageObject>,
    pub right: Box<LanguageObject>,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompoundCriteria {
    pub operator: LogicalOperator,
    pub criteria: Vec<LanguageObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotCriteria {
    pub criteria: Box<LanguageObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsNullCriteria {
    pub expression: Box<LanguageObject>,
    #[serde(default)]
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetweenCriteria {
    pub expression: Box<LanguageObject>,
    pub lower: Box<LanguageObject>,
    pub upper: Box<LanguageObject>,
    #[serde(default)]
    pub negated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchMode {
    #[default]
    Like,
    Similar,
    Regex,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Like => "LIKE",
            MatchMode::Similar => "SIMILAR",
            MatchMode::Regex => "REGEX",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCriteria {
    pub left: Box<LanguageObject>,
    pub right: Box<LanguageObject>,
    #[serde(default)]
    pub escape_char: Option<String>,
    #[serde(default)]
    pub negated: bool,
    #[serde(default)]
    pub mode: MatchMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCriteria {
    pub expression: Box<LanguageObject>,
    pub values: Vec<LanguageObject>,
    #[serde(default)]
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistsCriteria {
    pub command: Box<LanguageObject>,
    #[serde(default)]
    pub negated: bool,
}

// ========== Symbols and Expressions ==========

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSymbol {
    pub name: String,
    #[serde(default)]
    pub output_name: Option<String>,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub group: Option<GroupSymbol>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSymbol {
    pub name: String,
    #[serde(default)]
    pub definition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasSymbol {
    pub name: String,
    pub symbol: Box<LanguageObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionSymbol {
    pub name: String,
    pub expression: Box<LanguageObject>,
}

/// `*` or `group.*`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MultipleElementSymbol {
    pub group: Option<GroupSymbol>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSymbol {
    pub name: String,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default)]
    pub args: Vec<LanguageObject>,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub condition: Option<Box<LanguageObject>>,
    #[serde(default)]
    pub order_by: Option<OrderBy>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Constant {
    pub value: Option<Literal>,
    pub type_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Function {
    pub name: String,
    #[serde(default)]
    pub args: Vec<LanguageObject>,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub implicit: bool,
}

/// A positional bind parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub index: i64,
    #[serde(default)]
    pub type_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalarSubquery {
    pub command: Box<LanguageObject>,
    #[serde(default)]
    pub type_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchedCase {
    pub when: Vec<LanguageObject>,
    pub then: Vec<LanguageObject>,
    #[serde(default)]
    pub else_expression: Option<Box<LanguageObject>>,
    #[serde(default)]
    pub type_name: Option<String>,
}

// ========== Documents ==========

fn version_default() -> i64 {
    1
}

fn visible_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VdbDocument {
    pub name: String,
    #[serde(default = "version_default")]
    pub version: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub connection_type: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub models: Vec<ModelDocument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelType {
    #[default]
    Physical,
    Virtual,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Physical => "PHYSICAL",
            ModelType::Virtual => "VIRTUAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDocument {
    pub name: String,
    #[serde(default)]
    pub model_type: ModelType,
    #[serde(default = "visible_default")]
    pub visible: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata_type: Option<String>,
    /// Embedded DDL text, stored verbatim
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub sources: Vec<ModelSourceDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSourceDocument {
    pub name: String,
    #[serde(default)]
    pub translator: Option<String>,
    #[serde(default)]
    pub jndi_name: Option<String>,
}

// ========== Extensions ==========

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionNode {
    /// Key into the extension registry
    pub kind: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Literal>,
    #[serde(default)]
    pub children: Vec<LanguageObject>,
}
