use datagraph::lexicon::{dv, sql};
use datagraph::model::{Connection, DomainKind, Model, Statement, Vdb};
use datagraph::sequencer::ast::LanguageObject;
use datagraph::{Error, GraphStore, NodePath, Sequencer, TypeRegistry, WorkspaceManager};

const ORDERS_BY_CUSTOMER: &str = r#"{
    "node": "query",
    "select": { "distinct": true, "symbols": [
        { "node": "elementSymbol", "name": "c.name", "typeName": "varchar" },
        { "node": "aliasSymbol", "name": "total",
          "symbol": { "node": "aggregateSymbol", "name": "SUM",
                      "args": [ { "node": "elementSymbol", "name": "o.amount", "typeName": "decimal" } ] } }
    ]},
    "from": { "clauses": [
        { "node": "joinPredicate", "joinType": "LEFT_OUTER",
          "left": { "node": "unaryFromClause", "group": { "name": "customers", "definition": "c" } },
          "right": { "node": "unaryFromClause", "group": { "name": "orders", "definition": "o" } },
          "criteria": [
            { "node": "compareCriteria", "operator": "=",
              "left": { "node": "elementSymbol", "name": "c.id" },
              "right": { "node": "elementSymbol", "name": "o.customer_id" } }
          ] }
    ]},
    "criteria": {
        "node": "compoundCriteria", "operator": "AND",
        "criteria": [
            { "node": "isNullCriteria", "negated": true, "expression": { "node": "elementSymbol", "name": "o.shipped" } },
            { "node": "betweenCriteria",
              "expression": { "node": "elementSymbol", "name": "o.amount" },
              "lower": { "node": "constant", "value": 10, "typeName": "integer" },
              "upper": { "node": "constant", "value": 500, "typeName": "integer" } }
        ]
    },
    "groupBy": { "symbols": [ { "node": "elementSymbol", "name": "c.name" } ] },
    "orderBy": { "items": [ { "symbol": { "node": "elementSymbol", "name": "total" }, "ascending": false } ] },
    "limit": { "rowLimit": { "node": "constant", "value": 20, "typeName": "integer" } }
}"#;

const PORTFOLIO_VDB: &str = r#"{
    "node": "vdb",
    "name": "Portfolio",
    "version": 1,
    "description": "accounts and holdings",
    "properties": { "UseConnectorMetadata": "true" },
    "models": [
        { "name": "Accounts", "metadataType": "DDL",
          "definition": "CREATE FOREIGN TABLE account (id integer);",
          "sources": [ { "name": "pg1", "translator": "postgresql", "jndiName": "java:/pg1" } ] },
        { "name": "Views", "modelType": "VIRTUAL", "visible": false }
    ]
}"#;

fn sequence(text: &str) -> (GraphStore, NodePath) {
    let store = GraphStore::open_temporary().unwrap();
    let workspace = WorkspaceManager::default();
    let mut uow = store.begin("sequence").unwrap();
    let parent = workspace.statements_folder(&mut uow).unwrap();
    let root = Sequencer::default()
        .sequence(&mut uow, text, &parent)
        .into_result()
        .unwrap()
        .0
        .unwrap();
    uow.commit().unwrap();
    (store, root)
}

#[test]
fn test_sequencing_is_deterministic() {
    let sequencer = Sequencer::default();
    let store = GraphStore::open_temporary().unwrap();
    let mut uow = store.begin("determinism").unwrap();
    let first = uow.create_node(&NodePath::root(), "first", "nt:folder").unwrap();
    let second = uow.create_node(&NodePath::root(), "second", "nt:folder").unwrap();

    let a = sequencer.sequence(&mut uow, ORDERS_BY_CUSTOMER, &first).into_result().unwrap();
    let b = sequencer.sequence(&mut uow, ORDERS_BY_CUSTOMER, &second).into_result().unwrap();
    assert_eq!(a.1, Vec::new());

    let snap_a = uow.snapshot(&a.0.unwrap()).unwrap();
    let snap_b = uow.snapshot(&b.0.unwrap()).unwrap();
    assert_eq!(snap_a, snap_b);
    assert!(snap_a.node_count() > 20);
    assert_eq!(
        serde_json::to_string(&snap_a).unwrap(),
        serde_json::to_string(&snap_b).unwrap()
    );
}

#[test]
fn test_clause_order_follows_source() {
    let (store, root) = sequence(ORDERS_BY_CUSTOMER);
    let mut uow = store.begin("read").unwrap();
    let snap = uow.snapshot(&root).unwrap();
    let names: Vec<&str> = snap.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["sql:select", "sql:from", "sql:criteria", "sql:groupBy", "sql:orderBy", "sql:limit"]
    );

    let symbols = &snap.child("sql:select").unwrap().children;
    assert_eq!(symbols[0].name, "sql:symbols");
    assert_eq!(symbols[1].name, "sql:symbols[2]");
    assert_eq!(symbols[1].node_type, sql::ALIAS_SYMBOL);
}

#[test]
fn test_sequenced_root_resolves_as_statement() {
    let (store, root) = sequence(ORDERS_BY_CUSTOMER);
    let registry = TypeRegistry::standard();
    let workspace = WorkspaceManager::default();
    let mut uow = store.begin("resolve").unwrap();

    let obj = registry.resolve(&mut uow, &root).unwrap().unwrap();
    assert_eq!(obj.kind(), DomainKind::Statement);
    let statement = registry.resolve_as::<Statement>(&mut uow, &root).unwrap();
    assert_eq!(statement.command_type(&mut uow).unwrap(), sql::QUERY);
    assert_eq!(workspace.statements(&mut uow).unwrap(), vec![statement]);

    // resolver soundness: never constructed over a foreign discriminator
    let err = registry.resolve_as::<Connection>(&mut uow, &root).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { ref actual, .. } if actual == sql::QUERY));

    // clause nodes belong to no domain variant
    let select = root.child("sql:select").unwrap();
    assert!(registry.resolve(&mut uow, &select).unwrap().is_none());
    assert!(!uow.has_changes());
}

#[test]
fn test_vdb_document_resolves_through_facades() {
    let store = GraphStore::open_temporary().unwrap();
    let workspace = WorkspaceManager::default();
    let sequencer = Sequencer::default();
    let mut uow = store.begin("vdb").unwrap();

    let tree = sequencer.parse(PORTFOLIO_VDB).unwrap();
    assert!(matches!(tree, LanguageObject::Vdb(_)));
    let folder = workspace.vdbs_folder(&mut uow).unwrap();
    let root = sequencer.sequence_tree(&mut uow, &tree, &folder).root.unwrap();
    uow.commit().unwrap();

    let mut uow = store.begin("read").unwrap();
    let vdb = workspace.registry().resolve_as::<Vdb>(&mut uow, &root).unwrap();
    assert_eq!(vdb.version(&mut uow).unwrap(), Some(1));
    assert_eq!(vdb.property(&mut uow, "UseConnectorMetadata").unwrap().as_deref(), Some("true"));

    let models: Vec<Model> = vdb.models(&mut uow).unwrap();
    assert_eq!(models.iter().map(|m| m.name()).collect::<Vec<_>>(), vec!["Accounts", "Views"]);
    assert_eq!(models[1].model_type(&mut uow).unwrap().as_deref(), Some("VIRTUAL"));
    assert!(!models[1].visible(&mut uow).unwrap());
    assert!(models[0].definition(&mut uow).unwrap().unwrap().starts_with("CREATE FOREIGN TABLE"));

    let sources = models[0].sources(&mut uow).unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].jndi_name(&mut uow).unwrap().as_deref(), Some("java:/pg1"));
}

#[test]
fn test_failed_sequencing_rolls_back_cleanly() {
    let store = GraphStore::open_temporary().unwrap();
    let mut uow = store.begin_write("bad").unwrap();
    // the first select symbol is written before the uneven CASE is reached
    let half_valid = r#"{
        "node": "query",
        "select": { "symbols": [
            { "node": "elementSymbol", "name": "a", "typeName": "varchar" },
            { "node": "searchedCase",
              "when": [ { "node": "isNullCriteria", "expression": { "node": "elementSymbol", "name": "a" } } ],
              "then": [] }
        ]}
    }"#;
    let outcome = Sequencer::default().sequence(&mut uow, half_valid, &NodePath::root());
    assert!(matches!(outcome.error, Some(Error::Sequencing(_))));

    let query = outcome.root.unwrap();
    assert_eq!(uow.node_type(&query).unwrap().as_deref(), Some(sql::QUERY));
    let select = uow.children(&query).unwrap().remove(0);
    assert_eq!(uow.children(&select).unwrap().len(), 1);
    assert!(uow.has_changes());
    uow.rollback().unwrap();

    let mut uow = store.begin("check").unwrap();
    assert!(uow.children(&NodePath::root()).unwrap().is_empty());
    assert_eq!(store.stats().unwrap().nodes, 1);
}

#[test]
fn test_statement_under_connection_schema() {
    let store = GraphStore::open_temporary().unwrap();
    let workspace = WorkspaceManager::default();
    let mut uow = store.begin("schema").unwrap();
    let connection = workspace
        .create_connection(&mut uow, &datagraph::ExternalSource::new("pg1", "postgresql"))
        .unwrap();
    let schema = connection.ensure_schema(&mut uow).unwrap();
    Sequencer::default()
        .sequence(&mut uow, ORDERS_BY_CUSTOMER, schema.path())
        .into_result()
        .unwrap();

    let statements = schema.statements(&mut uow).unwrap();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].path().parent().unwrap().name(), dv::SCHEMA_NODE);
}
