//! End-to-end import runs against a scripted directory and the in-memory
//! record store.

mod common;

use std::sync::Arc;

use common::{base_source, init_test_logging, person, Call, ScriptedDirectory};
use ldapimporter_core::prelude::*;
use ldapimporter_core::registry::{ASSOCIATIONS_TABLE, ESTABLISHMENTS_TABLE};

fn session(
    source: &HashMapConfigSource,
    directory: ScriptedDirectory,
) -> (ImportSession<ScriptedDirectory>, Arc<InMemoryRecordStore>) {
    init_test_logging();
    let store = Arc::new(InMemoryRecordStore::new());
    let config = ImportConfig::from_source(source);
    (ImportSession::new(config, directory, store.clone()), store)
}

#[tokio::test]
async fn test_single_user_with_functional_group() {
    let source = base_source().with(
        "cas_import_map_groups_fonctionel",
        r#"[{"filter":"\\d[a-z]+","naming":"Classe ${0}"}]"#,
    );
    let directory = ScriptedDirectory::new().with_pages(vec![vec![person("jdoe", &["cn=7A,ou=classes"])
        .with("givenName", ["Jane"])
        .with("sn", ["Doe"])]]);
    let (mut session, _) = session(&source, directory);

    let report = session.execute().await.unwrap();

    let jdoe = &report.users["jdoe"];
    assert_eq!(jdoe.uid, "jdoe");
    assert_eq!(jdoe.display_name, "Jane Doe");
    assert_eq!(jdoe.groups, vec!["Classe 7A"]);
    assert_eq!(report.statistics.imported, 1);
    assert_eq!(report.statistics.groups_synthesized, 1);
}

#[tokio::test]
async fn test_pages_are_followed_in_order() {
    let source = base_source().with(
        "cas_import_map_groups_fonctionel",
        r#"[{"filter":"cn=(\\w+)","naming":"${1}"}]"#,
    );
    let directory = ScriptedDirectory::new().with_pages(vec![
        vec![person("c", &["cn=g"]), person("a", &["cn=g"])],
        vec![person("b", &["cn=g"])],
    ]);
    let (mut session, _) = session(&source, directory);

    let report = session.execute().await.unwrap();
    let directory = session.into_client();

    let order: Vec<_> = report.users.keys().cloned().collect();
    assert_eq!(order, vec!["c", "a", "b"]);
    assert_eq!(report.statistics.pages, 2);
    assert_eq!(
        directory.calls,
        vec![
            Call::Connect("ldaps://ldap.example.com:636".to_string()),
            Call::Bind("cn=admin,dc=example,dc=com".to_string()),
            Call::Search(None),
            Call::Search(Some(b"cookie-1".to_vec())),
            Call::Close,
        ]
    );
}

#[tokio::test]
async fn test_search_requests_kept_attributes() {
    let source = base_source().with(
        "cas_import_map_groups_pedagogic",
        r#"[{"field":"ENTEleveClasses","filter":"(.*)","naming":"${cn}"}]"#,
    );
    let directory = ScriptedDirectory::new().with_pages(vec![vec![]]);
    let (mut session, _) = session(&source, directory);

    session.execute().await.unwrap();
    let request = session.into_client().last_request.unwrap();

    assert_eq!(request.base_dn, "ou=people,dc=example,dc=com");
    assert_eq!(request.filter, "(objectClass=person)");
    assert_eq!(request.page_size, 2);
    assert_eq!(
        request.attributes,
        vec![
            "uid",
            "givenName",
            "sn",
            "mail",
            "isMemberOf",
            "dn",
            "ESCOUAICourant",
            "enteleveclasses",
        ]
    );
}

#[tokio::test]
async fn test_users_without_group_source_are_skipped() {
    let directory = ScriptedDirectory::new().with_pages(vec![vec![
        person("nogroups", &[]),
        DirectoryEntry::new("cn=orphan").with("isMemberOf", ["cn=g"]),
        person("member", &["cn=unmatched"]),
    ]]);
    let (mut session, _) = session(&base_source(), directory);

    let report = session.execute().await.unwrap();

    let uids: Vec<_> = report.users.keys().cloned().collect();
    assert_eq!(uids, vec!["member"]);
    assert!(report.users["member"].groups.is_empty());
    assert_eq!(report.statistics.skipped, 2);
    assert_eq!(report.statistics.entries, 3);
}

#[tokio::test]
async fn test_unmatched_memberships_add_no_groups() {
    let source = base_source().with(
        "cas_import_map_groups_fonctionel",
        r#"[{"filter":"ou=classes","naming":"Classe"},{"filter":"ou=clubs","naming":"Club"}]"#,
    );
    let directory = ScriptedDirectory::new().with_pages(vec![vec![person(
        "jdoe",
        &["cn=a,ou=other", "cn=b,ou=clubs", "cn=c,ou=nowhere"],
    )]]);
    let (mut session, _) = session(&source, directory);

    let report = session.execute().await.unwrap();

    assert_eq!(report.users["jdoe"].groups, vec!["Club"]);
    assert_eq!(report.statistics.rule_misses, 5);
}

#[tokio::test]
async fn test_pedagogic_groups_and_establishments() {
    let source = base_source()
        .with(
            "cas_import_map_groups_fonctionel",
            r#"[{"filter":"cn=profs","naming":"Profs ${nometablissement}"}]"#,
        )
        .with(
            "cas_import_map_groups_pedagogic",
            r#"[{"field":"ENTEleveClasses","filter":"^cn=(\\w+),","naming":"${1} - ${nometablissement}"}]"#,
        )
        .with("cas_import_regex_name_uai", r"ou=(\w{8}) - ([^,]+)")
        .with("cas_import_map_current_uai", "ESCOUAICourant");
    let directory = ScriptedDirectory::new()
        .with_pages(vec![vec![
            person("prof", &["cn=profs,ou=0450822X - Lycee Voltaire,ou=structures"]),
            person("eleve", &[])
                .with("ESCOUAICourant", ["0450822X"])
                .with("ENTEleveClasses", ["cn=7A,ou=groupes$7A$extra"]),
        ]])
        .with_group(
            DirectoryEntry::new("cn=7A,ou=groupes").with("ENTStructureUAI", ["0450822X"]),
        );
    let (mut session, store) = session(&source, directory);

    let report = session.execute().await.unwrap();

    assert_eq!(report.users["prof"].groups, vec!["Profs Lycee Voltaire"]);
    let eleve = &report.users["eleve"];
    assert_eq!(eleve.groups, vec!["7A - Lycee Voltaire"]);
    assert_eq!(eleve.current_org_code, "0450822X");

    assert_eq!(store.row_count(ESTABLISHMENTS_TABLE).await, 1);
    assert_eq!(
        report.establishments,
        vec![EstablishmentRecord {
            org_code: "0450822X".to_string(),
            name: "Lycee Voltaire".to_string(),
        }]
    );
    let subjects: Vec<_> = session
        .registry()
        .associations("0450822X")
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.subject_id)
        .collect();
    assert_eq!(
        subjects,
        vec!["Profs Lycee Voltaire", "prof", "7A - Lycee Voltaire", "eleve"]
    );
    assert_eq!(store.row_count(ASSOCIATIONS_TABLE).await, 4);
    assert_eq!(session.into_client().reads(), vec!["cn=7A,ou=groupes"]);
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let source = base_source()
        .with(
            "cas_import_map_groups_fonctionel",
            r#"[{"filter":"cn=profs","naming":"Profs"}]"#,
        )
        .with("cas_import_regex_name_uai", r"ou=(\w{8}) - ([^,]+)");
    let pages = || vec![vec![person("prof", &["cn=profs,ou=0450822X - Lycee Voltaire"])]];

    let store = Arc::new(InMemoryRecordStore::new());
    for _ in 0..2 {
        let mut session = ImportSession::new(
            ImportConfig::from_source(&source),
            ScriptedDirectory::new().with_pages(pages()),
            store.clone(),
        );
        session.execute().await.unwrap();
    }

    assert_eq!(store.row_count(ESTABLISHMENTS_TABLE).await, 1);
    assert_eq!(store.row_count(ASSOCIATIONS_TABLE).await, 2);
}

#[tokio::test]
async fn test_merge_prefers_enabled_account() {
    let source = base_source()
        .with(
            "cas_import_map_groups_fonctionel",
            r#"[{"filter":"cn=(\\w+)","naming":"${1}"}]"#,
        )
        .with("cas_import_map_enabled", "userAccountControl")
        .with("cas_import_map_enabled_and_bitwise", "2")
        .with("cas_import_merge", "1")
        .with("cas_import_merge_enabled", "1");
    let directory = ScriptedDirectory::new().with_pages(vec![
        vec![person("jdoe", &["cn=teachers"]).with("userAccountControl", ["512"])],
        vec![person("jdoe", &["cn=oldadmins"]).with("userAccountControl", ["514"])],
    ]);
    let (mut session, _) = session(&source, directory);

    let report = session.execute().await.unwrap();

    let jdoe = &report.users["jdoe"];
    assert!(jdoe.enabled);
    assert_eq!(jdoe.groups, vec!["teachers"]);
    assert_eq!(report.statistics.duplicates, 1);
}

#[tokio::test]
async fn test_merge_disabled_keeps_latest() {
    let source = base_source().with(
        "cas_import_map_groups_fonctionel",
        r#"[{"filter":"cn=(\\w+)","naming":"${1}"}]"#,
    );
    let directory = ScriptedDirectory::new().with_pages(vec![vec![
        person("jdoe", &["cn=first"]),
        person("jdoe", &["cn=second"]),
    ]]);
    let (mut session, _) = session(&source, directory);

    let report = session.execute().await.unwrap();

    assert_eq!(report.users.len(), 1);
    assert_eq!(report.users["jdoe"].groups, vec!["second"]);
}

#[tokio::test]
async fn test_connect_failure_is_fatal() {
    let (mut session, _) = session(&base_source(), ScriptedDirectory::failing_connect());

    let err = session.execute().await.unwrap_err();

    assert_eq!(err.stage(), "connect");
    let calls = session.into_client().calls;
    assert_eq!(calls.len(), 1);
}

#[tokio::test]
async fn test_bind_failure_is_fatal_and_closes() {
    let (mut session, _) = session(&base_source(), ScriptedDirectory::failing_bind());

    let err = session.execute().await.unwrap_err();

    assert_eq!(err.stage(), "bind");
    assert!(matches!(
        err,
        ImportError::Bind(DirectoryError::AuthenticationFailed)
    ));
    assert_eq!(session.into_client().calls.last(), Some(&Call::Close));
}

#[tokio::test]
async fn test_search_failure_aborts_mid_run() {
    let source = base_source().with(
        "cas_import_map_groups_fonctionel",
        r#"[{"filter":"cn=(\\w+)","naming":"${1}"}]"#,
    );
    let directory = ScriptedDirectory::new()
        .with_pages(vec![vec![person("a", &["cn=g"])]])
        .with_search_error("server went away");
    let (mut session, _) = session(&source, directory);

    let err = session.execute().await.unwrap_err();

    assert_eq!(err.stage(), "search");
    assert!(matches!(err, ImportError::Search(DirectoryError::SearchFailed { .. })));
    assert_eq!(session.into_client().calls.last(), Some(&Call::Close));
}

#[tokio::test]
async fn test_missing_host_fails_before_connecting() {
    let source = base_source().with("cas_import_ad_host", "");
    let (mut session, _) = session(&source, ScriptedDirectory::new());

    let err = session.execute().await.unwrap_err();

    assert_eq!(err.stage(), "config");
    assert!(session.into_client().calls.is_empty());
}

#[tokio::test]
async fn test_run_requires_open() {
    let (mut session, _) = session(&base_source(), ScriptedDirectory::new());

    let err = session.run().await.unwrap_err();

    assert_eq!(err.stage(), "connect");
}

/// Record store on a database that has no host users table.
struct MissingUsersTable(InMemoryRecordStore);

#[async_trait::async_trait]
impl RecordStore for MissingUsersTable {
    async fn ensure_table(&self, table: &TableSpec) -> StoreResult<()> {
        self.0.ensure_table(table).await
    }

    async fn add_column(&self, table: &str, _column: &str) -> StoreResult<()> {
        Err(StoreError::TableNotFound {
            table: table.to_string(),
        })
    }

    async fn exists(&self, table: &str, predicate: &Predicate) -> StoreResult<bool> {
        self.0.exists(table, predicate).await
    }

    async fn select(&self, table: &str, predicate: &Predicate) -> StoreResult<Vec<Row>> {
        self.0.select(table, predicate).await
    }

    async fn insert(&self, table: &str, fields: &Row) -> StoreResult<()> {
        self.0.insert(table, fields).await
    }
}

#[tokio::test]
async fn test_missing_users_table_does_not_abort() {
    init_test_logging();
    let source = base_source().with(
        "cas_import_map_groups_fonctionel",
        r#"[{"filter":"cn=(\\w+)","naming":"${1}"}]"#,
    );
    let directory = ScriptedDirectory::new().with_pages(vec![vec![person("jdoe", &["cn=profs"])]]);
    let store = Arc::new(MissingUsersTable(InMemoryRecordStore::new()));
    let mut session = ImportSession::new(ImportConfig::from_source(&source), directory, store);

    let report = session.execute().await.unwrap();

    assert_eq!(report.statistics.imported, 1);
    assert_eq!(report.users["jdoe"].groups, vec!["profs"]);
}
