mod common;

use subject_registry::RegistryError;
use subject_registry::codec::RevealedField;
use subject_registry::db::Role;
use subject_registry::service::RoleVisibility;
use subject_registry::service::reconciliation::PersonalNamesRequest;

use common::harness;

fn names(first: Option<&str>, last: Option<&str>) -> PersonalNamesRequest {
    PersonalNamesRequest {
        first_name: first.map(str::to_string),
        last_name: last.map(str::to_string),
    }
}

#[tokio::test]
async fn end_to_end_listing_hides_students() {
    let h = harness().await;
    let a = h.register("u1", "e1", "college").await.id;
    let visibility = h.state.gate.listing_visibility();

    let rows = h
        .state
        .aggregation
        .list_by_education_level("college", &visibility)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].subject_id, a);
    assert_eq!(rows[0].first_name, RevealedField::Unset);
    assert_eq!(rows[0].last_name.as_str(), "N/A");

    h.state
        .reconciliation
        .set_personal_names(&h.admin, &a.to_string(), names(Some("Ada"), Some("Lovelace")))
        .await
        .unwrap();
    let b = h.register("u2", "e2", "college").await.id;
    h.storage().set_role(b, Role::Student).await.unwrap();

    let rows = h
        .state
        .aggregation
        .list_by_education_level("college", &visibility)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].subject_id, a);
    assert_eq!(rows[0].first_name.as_str(), "Ada");
    assert_eq!(rows[0].last_name.as_str(), "Lovelace");
}

#[tokio::test]
async fn names_are_stored_encrypted() {
    let h = harness().await;
    let a = h.register("u1", "e1@example.com", "college").await.id;
    h.state
        .reconciliation
        .set_personal_names(&h.admin, &a.to_string(), names(Some("Grace"), None))
        .await
        .unwrap();

    let (first, last): (String, String) =
        sqlx::query_as("SELECT first_name, last_name FROM personal_details WHERE subject_id = ?")
            .bind(a.to_string())
            .fetch_one(h.storage().pool())
            .await
            .unwrap();
    assert!(first.starts_with("v1:"));
    assert!(!first.contains("Grace"));
    assert_eq!(h.codec.decrypt(&first).unwrap(), "Grace");
    assert_eq!(last, "N/A");
}

#[tokio::test]
async fn only_admins_set_names() {
    let h = harness().await;
    let a = h.register("u1", "e1@example.com", "college").await;
    let err = h
        .state
        .reconciliation
        .set_personal_names(&a, &a.id.to_string(), names(Some("Ada"), None))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Forbidden(_)));
}

#[tokio::test]
async fn students_hidden_regardless_of_caller_role() {
    let h = harness().await;
    let staff = h.register("staff", "staff@example.com", "college").await;
    let student = h.register("pupil", "pupil@example.com", "college").await;
    h.storage().set_role(student.id, Role::Student).await.unwrap();
    let student_caller = subject_registry::service::Caller {
        id: student.id,
        role: Role::Student,
    };

    for caller in [h.admin, staff, student_caller] {
        // Visibility comes from the gate, not from who is asking.
        h.state
            .gate
            .authorize(caller.role, subject_registry::service::Operation::ListAccounts)
            .unwrap();
        let rows = h
            .state
            .aggregation
            .list_by_education_level("college", &h.state.gate.listing_visibility())
            .await
            .unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.subject_id).collect();
        assert_eq!(ids, vec![staff.id]);
    }
}

#[tokio::test]
async fn visibility_predicate_is_honoured() {
    let h = harness().await;
    let a = h.register("u1", "e1@example.com", "college").await;
    let b = h.register("u2", "e2@example.com", "college").await;
    h.storage().set_role(b.id, Role::Student).await.unwrap();

    let rows = h
        .state
        .aggregation
        .list_by_education_level("college", &RoleVisibility::all())
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    let rows = h
        .state
        .aggregation
        .list_by_education_level("college", &RoleVisibility::excluding(Role::Staff))
        .await
        .unwrap();
    let ids: Vec<_> = rows.iter().map(|r| r.subject_id).collect();
    assert_eq!(ids, vec![b.id]);
    assert_ne!(ids, vec![a.id]);
}

#[tokio::test]
async fn subjects_without_personal_detail_are_skipped() {
    let h = harness().await;
    let a = h.register("u1", "e1@example.com", "college").await;
    let b = h.register("u2", "e2@example.com", "college").await;
    sqlx::query("DELETE FROM personal_details WHERE subject_id = ?")
        .bind(a.id.to_string())
        .execute(h.storage().pool())
        .await
        .unwrap();

    let rows = h
        .state
        .aggregation
        .list_by_education_level("college", &h.state.gate.listing_visibility())
        .await
        .unwrap();
    let ids: Vec<_> = rows.iter().map(|r| r.subject_id).collect();
    assert_eq!(ids, vec![b.id]);
}

#[tokio::test]
async fn orphaned_education_rows_are_skipped() {
    let h = harness().await;
    let a = h.register("u1", "e1@example.com", "college").await;
    sqlx::query("PRAGMA foreign_keys = OFF")
        .execute(h.storage().pool())
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO education_records (subject_id, education_level) VALUES (?, 'college')",
    )
    .bind(subject_registry::db::SubjectId::generate().to_string())
    .execute(h.storage().pool())
    .await
    .unwrap();

    let rows = h
        .state
        .aggregation
        .list_by_education_level("college", &h.state.gate.listing_visibility())
        .await
        .unwrap();
    let ids: Vec<_> = rows.iter().map(|r| r.subject_id).collect();
    assert_eq!(ids, vec![a.id]);
}

#[tokio::test]
async fn output_follows_registration_order_and_level() {
    let h = harness().await;
    let mut expected = Vec::new();
    for i in 0..5 {
        let id = h
            .register(&format!("c{i}"), &format!("c{i}@example.com"), "college")
            .await
            .id;
        expected.push(id);
        h.register(&format!("s{i}"), &format!("s{i}@example.com"), "seniorHigh")
            .await;
    }

    let rows = h
        .state
        .aggregation
        .list_by_education_level("college", &h.state.gate.listing_visibility())
        .await
        .unwrap();
    let ids: Vec<_> = rows.iter().map(|r| r.subject_id).collect();
    assert_eq!(ids, expected);

    let none = h
        .state
        .aggregation
        .list_by_education_level("graduate", &h.state.gate.listing_visibility())
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn undecryptable_name_fails_the_whole_listing() {
    let h = harness().await;
    h.register("u1", "e1@example.com", "college").await;
    let b = h.register("u2", "e2@example.com", "college").await;
    sqlx::query("UPDATE personal_details SET first_name = 'v1:AAAA' WHERE subject_id = ?")
        .bind(b.id.to_string())
        .execute(h.storage().pool())
        .await
        .unwrap();

    let err = h
        .state
        .aggregation
        .list_by_education_level("college", &h.state.gate.listing_visibility())
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Codec(_)));
}

#[tokio::test]
async fn failed_detail_lookup_fails_the_whole_listing() {
    let h = harness().await;
    h.register("u1", "e1@example.com", "college").await;
    h.register("u2", "e2@example.com", "college").await;
    sqlx::query("DROP TABLE personal_details")
        .execute(h.storage().pool())
        .await
        .unwrap();

    let err = h
        .state
        .aggregation
        .list_by_education_level("college", &h.state.gate.listing_visibility())
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Storage(_)), "{err}");
}

#[tokio::test]
async fn summaries_serialize_with_marker() {
    let h = harness().await;
    let a = h.register("u1", "e1@example.com", "college").await.id;
    h.state
        .reconciliation
        .set_personal_names(&h.admin, &a.to_string(), names(None, Some("Hopper")))
        .await
        .unwrap();

    let rows = h
        .state
        .aggregation
        .list_by_education_level("college", &h.state.gate.listing_visibility())
        .await
        .unwrap();
    let json = serde_json::to_value(&rows).unwrap();
    assert_eq!(json[0]["subjectId"], a.to_string());
    assert_eq!(json[0]["firstName"], "N/A");
    assert_eq!(json[0]["lastName"], "Hopper");
}
