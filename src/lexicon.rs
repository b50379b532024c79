//! Node type discriminators and property names used in the graph

/// Workspace layout
pub mod dg {
    pub const ROOT: &str = "dg:root";
    pub const WORKSPACE: &str = "dg:workspace";
    pub const FOLDER: &str = "dg:folder";

    pub const WORKSPACE_NAME: &str = "workspace";
    pub const CONNECTIONS_FOLDER: &str = "connections";
    pub const DATASERVICES_FOLDER: &str = "dataservices";
    pub const VDBS_FOLDER: &str = "vdbs";
    pub const STATEMENTS_FOLDER: &str = "statements";
}

/// Dataservices and the persisted mirror of external sources
pub mod dv {
    pub const DATASERVICE: &str = "dv:dataService";
    pub const CONNECTION: &str = "dv:connection";
    pub const SCHEMA: &str = "dv:schema";

    /// Name of the schema child under a connection
    pub const SCHEMA_NODE: &str = "dv:schema";

    pub const SOURCE_ID: &str = "dv:sourceId";
    pub const DISPLAY_NAME: &str = "dv:displayName";
    pub const CONNECTION_TYPE: &str = "dv:connectionType";
    pub const TRANSLATOR: &str = "dv:translator";
    pub const ORIGIN: &str = "dv:origin";
    pub const ADDRESS: &str = "dv:address";
    pub const FINGERPRINT: &str = "dv:fingerprint";
    pub const DESCRIPTION: &str = "dv:description";
    pub const PUBLISHED_SOURCE_ID: &str = "dv:publishedSourceId";
    pub const SERVICE_VDB: &str = "dv:serviceVdb";
    pub const DDL: &str = "dv:ddl";
}

/// VDB documents
pub mod vdb {
    pub const VIRTUAL_DATABASE: &str = "vdb:virtualDatabase";
    pub const MODEL: &str = "vdb:declarativeModel";
    pub const MODEL_SOURCE: &str = "vdb:source";
    pub const PROPERTY: &str = "vdb:property";

    pub const NAME: &str = "vdb:name";
    pub const VERSION: &str = "vdb:version";
    pub const DESCRIPTION: &str = "vdb:description";
    pub const CONNECTION_TYPE: &str = "vdb:connectionType";
    pub const MODEL_TYPE: &str = "vdb:modelType";
    pub const VISIBLE: &str = "vdb:visible";
    pub const METADATA_TYPE: &str = "vdb:metadataType";
    pub const MODEL_DEFINITION: &str = "vdb:modelDefinition";
    pub const SOURCE_TRANSLATOR: &str = "vdb:sourceTranslator";
    pub const SOURCE_JNDI_NAME: &str = "vdb:sourceJndiName";
    pub const VALUE: &str = "vdb:value";

    /// Child references
    pub const MODELS: &str = "vdb:models";
    pub const SOURCES: &str = "vdb:sources";
}

/// SQL command trees
pub mod sql {
    // commands
    pub const QUERY: &str = "sql:query";
    pub const SET_QUERY: &str = "sql:setQuery";
    pub const INSERT: &str = "sql:insert";
    pub const UPDATE: &str = "sql:update";
    pub const DELETE: &str = "sql:delete";
    pub const STORED_PROCEDURE: &str = "sql:storedProcedure";

    /// Every discriminator that marks a command root
    pub const COMMAND_TYPES: &[&str] = &[QUERY, SET_QUERY, INSERT, UPDATE, DELETE, STORED_PROCEDURE];

    // clauses
    pub const SELECT: &str = "sql:select";
    pub const FROM: &str = "sql:from";
    pub const UNARY_FROM_CLAUSE: &str = "sql:unaryFromClause";
    pub const JOIN_PREDICATE: &str = "sql:joinPredicate";
    pub const SUBQUERY_FROM_CLAUSE: &str = "sql:subqueryFromClause";
    pub const GROUP_BY: &str = "sql:groupBy";
    pub const ORDER_BY: &str = "sql:orderBy";
    pub const ORDER_BY_ITEM: &str = "sql:orderByItem";
    pub const LIMIT: &str = "sql:limit";
    pub const INTO: &str = "sql:into";
    pub const OPTION: &str = "sql:option";
    pub const SET_CLAUSE: &str = "sql:setClause";
    pub const SP_PARAMETER: &str = "sql:spParameter";

    // criteria
    pub const COMPARE_CRITERIA: &str = "sql:compareCriteria";
    pub const COMPOUND_CRITERIA: &str = "sql:compoundCriteria";
    pub const NOT_CRITERIA: &str = "sql:notCriteria";
    pub const IS_NULL_CRITERIA: &str = "sql:isNullCriteria";
    pub const BETWEEN_CRITERIA: &str = "sql:betweenCriteria";
    pub const MATCH_CRITERIA: &str = "sql:matchCriteria";
    pub const SET_CRITERIA: &str = "sql:setCriteria";
    pub const EXISTS_CRITERIA: &str = "sql:existsCriteria";

    // symbols and expressions
    pub const ELEMENT_SYMBOL: &str = "sql:elementSymbol";
    pub const GROUP_SYMBOL: &str = "sql:groupSymbol";
    pub const ALIAS_SYMBOL: &str = "sql:aliasSymbol";
    pub const EXPRESSION_SYMBOL: &str = "sql:expressionSymbol";
    pub const MULTIPLE_ELEMENT_SYMBOL: &str = "sql:multipleElementSymbol";
    pub const AGGREGATE_SYMBOL: &str = "sql:aggregateSymbol";
    pub const CONSTANT: &str = "sql:constant";
    pub const FUNCTION: &str = "sql:function";
    pub const REFERENCE: &str = "sql:reference";
    pub const SCALAR_SUBQUERY: &str = "sql:scalarSubquery";
    pub const SEARCHED_CASE_EXPRESSION: &str = "sql:searchedCaseExpression";

    // properties
    pub const METADATA_VERSION: &str = "sql:metadataVersion";
    pub const TYPE_CLASS: &str = "sql:typeClass";
    pub const DISTINCT: &str = "sql:distinct";
    pub const NAME: &str = "sql:name";
    pub const OUTPUT_NAME: &str = "sql:outputName";
    pub const DEFINITION: &str = "sql:definition";
    pub const VALUE: &str = "sql:value";
    pub const MULTI_VALUED: &str = "sql:multiValued";
    pub const OPERATOR: &str = "sql:operator";
    pub const OPERATION: &str = "sql:operation";
    pub const ALL: &str = "sql:all";
    pub const NEGATED: &str = "sql:negated";
    pub const JOIN_TYPE: &str = "sql:joinType";
    pub const OPTIONAL: &str = "sql:optional";
    pub const ASCENDING: &str = "sql:ascending";
    pub const NULL_ORDERING: &str = "sql:nullOrdering";
    pub const ROLLUP: &str = "sql:rollup";
    pub const ESCAPE_CHAR: &str = "sql:escapeChar";
    pub const MATCH_MODE: &str = "sql:mode";
    pub const INDEX: &str = "sql:index";
    pub const IMPLICIT: &str = "sql:implicit";
    pub const PROCEDURE_NAME: &str = "sql:procedureName";
    pub const PARAMETER_TYPE: &str = "sql:parameterType";
    pub const MAKE_DEPENDENT: &str = "sql:makeDependent";
    pub const NO_CACHE: &str = "sql:noCache";
    pub const NO_CACHE_GROUPS: &str = "sql:noCacheGroups";
    pub const DEPENDENT_GROUPS: &str = "sql:dependentGroups";
    pub const NOT_DEPENDENT_GROUPS: &str = "sql:notDependentGroups";

    // child references
    pub const REF_SELECT: &str = "sql:select";
    pub const REF_FROM: &str = "sql:from";
    pub const REF_CRITERIA: &str = "sql:criteria";
    pub const REF_GROUP_BY: &str = "sql:groupBy";
    pub const REF_HAVING: &str = "sql:having";
    pub const REF_ORDER_BY: &str = "sql:orderBy";
    pub const REF_LIMIT: &str = "sql:limit";
    pub const REF_OPTION: &str = "sql:option";
    pub const REF_INTO: &str = "sql:into";
    pub const REF_SYMBOLS: &str = "sql:symbols";
    pub const REF_CLAUSES: &str = "sql:clauses";
    pub const REF_GROUP: &str = "sql:group";
    pub const REF_LEFT_CLAUSE: &str = "sql:leftClause";
    pub const REF_RIGHT_CLAUSE: &str = "sql:rightClause";
    pub const REF_JOIN_CRITERIA: &str = "sql:joinCriteria";
    pub const REF_LEFT_EXPRESSION: &str = "sql:leftExpression";
    pub const REF_RIGHT_EXPRESSION: &str = "sql:rightExpression";
    pub const REF_EXPRESSION: &str = "sql:expression";
    pub const REF_LOWER_EXPRESSION: &str = "sql:lowerExpression";
    pub const REF_UPPER_EXPRESSION: &str = "sql:upperExpression";
    pub const REF_VALUES: &str = "sql:values";
    pub const REF_VARIABLES: &str = "sql:variables";
    pub const REF_QUERY_EXPRESSION: &str = "sql:queryExpression";
    pub const REF_CHANGE_LIST: &str = "sql:changeList";
    pub const REF_ARGS: &str = "sql:args";
    pub const REF_WHEN: &str = "sql:when";
    pub const REF_THEN: &str = "sql:then";
    pub const REF_ELSE: &str = "sql:elseExpression";
    pub const REF_COMMAND: &str = "sql:command";
    pub const REF_LEFT_QUERY: &str = "sql:leftQuery";
    pub const REF_RIGHT_QUERY: &str = "sql:rightQuery";
    pub const REF_ORDER_BY_ITEMS: &str = "sql:orderByItems";
    pub const REF_OFFSET: &str = "sql:offset";
    pub const REF_ROW_LIMIT: &str = "sql:rowLimit";
    pub const REF_PARAMETERS: &str = "sql:parameters";
    pub const REF_SYMBOL: &str = "sql:symbol";
    pub const REF_CONDITION: &str = "sql:condition";
}
