//! Facility registry behavior: CRUD, tenancy scoping, email uniqueness.

mod common;

use common::{assert_error_body, TestApp};
use serial_test::serial;

async fn create_facility(
    app: &TestApp,
    token: &str,
    name: &str,
    email: &str,
) -> (reqwest::StatusCode, serde_json::Value) {
    let res = app
        .client
        .post(app.url("/facilities"))
        .bearer_auth(token)
        .json(&serde_json::json!({
            "name": name,
            "email": email,
            "password": "facility-password",
            "contact_person": "Pat Lee",
            "billing_period": "monthly",
        }))
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

#[tokio::test]
#[serial]
async fn organization_creates_and_lists_facilities() {
    let app = TestApp::spawn().await;
    app.seed_organization("Acme Health", "org@acme.test", "org-password")
        .await;
    let token = app.login("org@acme.test", "org-password").await;

    let (status, body) = create_facility(&app, &token, "Beta Clinic", "beta@acme.test").await;
    assert_eq!(status, 201);
    assert_eq!(body["message"], "Facility created successfully");
    assert_eq!(body["facility"]["name"], "Beta Clinic");
    assert!(body["facility"].get("password_hash").is_none());

    let (status, _) = create_facility(&app, &token, "Alpha Clinic", "alpha@acme.test").await;
    assert_eq!(status, 201);

    let res = app
        .client
        .get(app.url("/facilities"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["total"], 2);
    // Ordered by name.
    assert_eq!(body["facilities"][0]["name"], "Alpha Clinic");
    assert_eq!(body["facilities"][1]["name"], "Beta Clinic");
}

#[tokio::test]
#[serial]
async fn facility_creation_validates_input() {
    let app = TestApp::spawn().await;
    app.seed_organization("Acme Health", "org@acme.test", "org-password")
        .await;
    let token = app.login("org@acme.test", "org-password").await;

    let res = app
        .client
        .post(app.url("/facilities"))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "name": "No Email Clinic" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_error_body(&body, "Name, email, and password are required");
}

#[tokio::test]
#[serial]
async fn facility_email_must_be_unique_across_account_kinds() {
    let app = TestApp::spawn().await;
    app.seed_organization("Acme Health", "org@acme.test", "org-password")
        .await;
    let token = app.login("org@acme.test", "org-password").await;

    let (status, _) = create_facility(&app, &token, "Alpha Clinic", "alpha@acme.test").await;
    assert_eq!(status, 201);

    // Duplicate facility email.
    let (status, body) = create_facility(&app, &token, "Other Clinic", "alpha@acme.test").await;
    assert_eq!(status, 400);
    assert_error_body(&body, "Email already exists");

    // An organization's email is equally taken.
    let (status, body) = create_facility(&app, &token, "Shadow Clinic", "org@acme.test").await;
    assert_eq!(status, 400);
    assert_error_body(&body, "Email already exists");
}

#[tokio::test]
#[serial]
async fn facility_writes_are_organization_only() {
    let app = TestApp::spawn().await;
    let org_id = app
        .seed_organization("Acme Health", "org@acme.test", "org-password")
        .await;
    app.seed_facility(org_id, "Alpha Clinic", "alpha@acme.test", "facility-password")
        .await;
    let facility_token = app.login("alpha@acme.test", "facility-password").await;

    let (status, body) =
        create_facility(&app, &facility_token, "Rogue Clinic", "rogue@acme.test").await;
    assert_eq!(status, 403);
    assert_error_body(&body, "Only organizations can create facilities");

    let res = app
        .client
        .get(app.url("/facilities"))
        .bearer_auth(&facility_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
}

#[tokio::test]
#[serial]
async fn facility_reads_are_tenant_scoped() {
    let app = TestApp::spawn().await;
    let org_a = app
        .seed_organization("Org A", "a@orgs.test", "password-a")
        .await;
    let org_b = app
        .seed_organization("Org B", "b@orgs.test", "password-b")
        .await;
    let facility_a = app
        .seed_facility(org_a, "A Clinic", "a-clinic@orgs.test", "facility-password")
        .await;
    let facility_b = app
        .seed_facility(org_b, "B Clinic", "b-clinic@orgs.test", "facility-password")
        .await;

    // Org A cannot read Org B's facility.
    let token_a = app.login("a@orgs.test", "password-a").await;
    let res = app
        .client
        .get(app.url(&format!("/facilities/{}", facility_b)))
        .bearer_auth(&token_a)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    // A facility can read itself but no sibling.
    let clinic_token = app.login("a-clinic@orgs.test", "facility-password").await;
    let res = app
        .client
        .get(app.url(&format!("/facilities/{}", facility_a)))
        .bearer_auth(&clinic_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let res = app
        .client
        .get(app.url(&format!("/facilities/{}", facility_b)))
        .bearer_auth(&clinic_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
}

#[tokio::test]
#[serial]
async fn update_is_a_merge_patch() {
    let app = TestApp::spawn().await;
    let org_id = app
        .seed_organization("Acme Health", "org@acme.test", "org-password")
        .await;
    let facility_id = app
        .seed_facility(org_id, "Alpha Clinic", "alpha@acme.test", "facility-password")
        .await;
    let token = app.login("org@acme.test", "org-password").await;

    let res = app
        .client
        .put(app.url(&format!("/facilities/{}", facility_id)))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "phone": "+1-555-0100" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["facility"]["phone"], "+1-555-0100");
    // Untouched fields keep their stored values.
    assert_eq!(body["facility"]["name"], "Alpha Clinic");
    assert_eq!(body["facility"]["billing_period"], "monthly");
}

#[tokio::test]
#[serial]
async fn delete_is_refused_while_invoices_exist() {
    let app = TestApp::spawn().await;
    let org_id = app
        .seed_organization("Acme Health", "org@acme.test", "org-password")
        .await;
    let facility_id = app
        .seed_facility(org_id, "Alpha Clinic", "alpha@acme.test", "facility-password")
        .await;
    let token = app.login("org@acme.test", "org-password").await;

    sqlx::query(
        "INSERT INTO invoices (organization_id, facility_id, invoice_number, amount, due_date, \
         billing_period, period_start, period_end) \
         VALUES ($1, $2, 'INV-100', 250.00, '2026-09-30', 'monthly', '2026-08-01', '2026-08-31')",
    )
    .bind(org_id)
    .bind(facility_id)
    .execute(app.db.pool())
    .await
    .unwrap();

    let res = app
        .client
        .delete(app.url(&format!("/facilities/{}", facility_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_error_body(&body, "Cannot delete a facility with existing invoices");

    sqlx::query("DELETE FROM invoices WHERE invoice_number = 'INV-100'")
        .execute(app.db.pool())
        .await
        .unwrap();

    let res = app
        .client
        .delete(app.url(&format!("/facilities/{}", facility_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Facility deleted successfully");
}
