//! Invoice ledger behavior: creation, scoping, status flow, stats.

mod common;

use common::{assert_error_body, exists, TestApp};
use serial_test::serial;
use uuid::Uuid;

fn invoice_form(facility_id: Uuid, number: &str, amount: &str) -> reqwest::multipart::Form {
    reqwest::multipart::Form::new()
        .text("facility_id", facility_id.to_string())
        .text("invoice_number", number.to_string())
        .text("amount", amount.to_string())
        .text("due_date", "2026-09-30")
        .text("billing_period", "monthly")
        .text("period_start", "2026-08-01")
        .text("period_end", "2026-08-31")
}

async fn post_invoice(
    app: &TestApp,
    token: &str,
    form: reqwest::multipart::Form,
) -> (reqwest::StatusCode, serde_json::Value) {
    let res = app
        .client
        .post(app.url("/invoices"))
        .bearer_auth(token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

struct Tenant {
    org_id: Uuid,
    facility_id: Uuid,
    org_token: String,
    facility_token: String,
}

async fn seed_tenant(app: &TestApp, tag: &str) -> Tenant {
    let org_id = app
        .seed_organization(
            &format!("Org {}", tag),
            &format!("org-{}@test.test", tag),
            "org-password",
        )
        .await;
    let facility_id = app
        .seed_facility(
            org_id,
            &format!("Clinic {}", tag),
            &format!("clinic-{}@test.test", tag),
            "facility-password",
        )
        .await;
    Tenant {
        org_id,
        facility_id,
        org_token: app
            .login(&format!("org-{}@test.test", tag), "org-password")
            .await,
        facility_token: app
            .login(&format!("clinic-{}@test.test", tag), "facility-password")
            .await,
    }
}

#[tokio::test]
#[serial]
async fn create_generates_a_pdf_and_starts_pending() {
    let app = TestApp::spawn().await;
    let tenant = seed_tenant(&app, "a").await;

    let (status, body) = post_invoice(
        &app,
        &tenant.org_token,
        invoice_form(tenant.facility_id, "INV-001", "500.00"),
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(body["message"], "Invoice created successfully");
    assert_eq!(body["invoice"]["status"], "pending");
    assert_eq!(body["invoice"]["invoice_number"], "INV-001");

    let pdf_path = body["invoice"]["generated_pdf_path"].as_str().unwrap();
    assert!(exists(pdf_path), "Generated PDF missing: {}", pdf_path);
    let bytes = std::fs::read(pdf_path).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
#[serial]
async fn create_with_source_file_stores_it() {
    let app = TestApp::spawn().await;
    let tenant = seed_tenant(&app, "a").await;

    let form = invoice_form(tenant.facility_id, "INV-002", "125.50").part("file", app.pdf_part());
    let (status, body) = post_invoice(&app, &tenant.org_token, form).await;
    assert_eq!(status, 201);

    let file_path = body["invoice"]["file_path"].as_str().unwrap();
    assert!(exists(file_path), "Source file missing: {}", file_path);
}

#[tokio::test]
#[serial]
async fn create_reports_all_missing_fields() {
    let app = TestApp::spawn().await;
    let tenant = seed_tenant(&app, "a").await;

    let form = reqwest::multipart::Form::new()
        .text("facility_id", tenant.facility_id.to_string())
        .text("invoice_number", "INV-003");
    let (status, body) = post_invoice(&app, &tenant.org_token, form).await;
    assert_eq!(status, 400);
    assert_error_body(
        &body,
        "Missing required fields: amount, due_date, billing_period, period_start, period_end",
    );
}

#[tokio::test]
#[serial]
async fn create_rejects_bad_values() {
    let app = TestApp::spawn().await;
    let tenant = seed_tenant(&app, "a").await;

    let (status, body) = post_invoice(
        &app,
        &tenant.org_token,
        invoice_form(tenant.facility_id, "INV-004", "-10.00"),
    )
    .await;
    assert_eq!(status, 400);
    assert_error_body(&body, "Amount must not be negative");

    let form = invoice_form(tenant.facility_id, "INV-004", "ten dollars");
    let (status, body) = post_invoice(&app, &tenant.org_token, form).await;
    assert_eq!(status, 400);
    assert_error_body(&body, "Amount must be a valid number");

    let form = reqwest::multipart::Form::new()
        .text("facility_id", tenant.facility_id.to_string())
        .text("invoice_number", "INV-004")
        .text("amount", "10.00")
        .text("due_date", "30/09/2026")
        .text("billing_period", "monthly")
        .text("period_start", "2026-08-01")
        .text("period_end", "2026-08-31");
    let (status, body) = post_invoice(&app, &tenant.org_token, form).await;
    assert_eq!(status, 400);
    assert_error_body(&body, "Invalid date for due_date");
}

#[tokio::test]
#[serial]
async fn invoice_numbers_are_globally_unique() {
    let app = TestApp::spawn().await;
    let tenant_a = seed_tenant(&app, "a").await;
    let tenant_b = seed_tenant(&app, "b").await;

    let (status, _) = post_invoice(
        &app,
        &tenant_a.org_token,
        invoice_form(tenant_a.facility_id, "INV-005", "100.00"),
    )
    .await;
    assert_eq!(status, 201);

    // Even another organization cannot reuse the number.
    let (status, body) = post_invoice(
        &app,
        &tenant_b.org_token,
        invoice_form(tenant_b.facility_id, "INV-005", "200.00"),
    )
    .await;
    assert_eq!(status, 400);
    assert_error_body(&body, "Invoice number already exists");
}

#[tokio::test]
#[serial]
async fn create_rejects_foreign_facility() {
    let app = TestApp::spawn().await;
    let tenant_a = seed_tenant(&app, "a").await;
    let tenant_b = seed_tenant(&app, "b").await;

    let (status, body) = post_invoice(
        &app,
        &tenant_a.org_token,
        invoice_form(tenant_b.facility_id, "INV-006", "100.00"),
    )
    .await;
    assert_eq!(status, 404);
    assert_error_body(&body, "Facility not found");
}

#[tokio::test]
#[serial]
async fn lists_are_scoped_and_filterable() {
    let app = TestApp::spawn().await;
    let tenant_a = seed_tenant(&app, "a").await;
    let tenant_b = seed_tenant(&app, "b").await;

    post_invoice(
        &app,
        &tenant_a.org_token,
        invoice_form(tenant_a.facility_id, "INV-A1", "100.00"),
    )
    .await;
    post_invoice(
        &app,
        &tenant_a.org_token,
        invoice_form(tenant_a.facility_id, "INV-A2", "200.00"),
    )
    .await;
    post_invoice(
        &app,
        &tenant_b.org_token,
        invoice_form(tenant_b.facility_id, "INV-B1", "300.00"),
    )
    .await;

    // Organization sees only its own.
    let res = app
        .client
        .get(app.url("/invoices"))
        .bearer_auth(&tenant_a.org_token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["total"], 2);
    assert_eq!(body["invoices"][0]["facility_name"], "Clinic a");

    // Facility sees the invoices billed to it, with the issuer joined.
    let res = app
        .client
        .get(app.url("/invoices"))
        .bearer_auth(&tenant_b.facility_token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["total"], 1);
    assert_eq!(body["invoices"][0]["invoice_number"], "INV-B1");
    assert_eq!(body["invoices"][0]["organization_name"], "Org b");

    // Status filter.
    let res = app
        .client
        .get(app.url("/invoices?status=paid"))
        .bearer_auth(&tenant_a.org_token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["total"], 0);

    let res = app
        .client
        .get(app.url("/invoices?status=bogus"))
        .bearer_auth(&tenant_a.org_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
}

#[tokio::test]
#[serial]
async fn status_updates_are_strict_and_audited() {
    let app = TestApp::spawn().await;
    let tenant = seed_tenant(&app, "a").await;

    let (_, body) = post_invoice(
        &app,
        &tenant.org_token,
        invoice_form(tenant.facility_id, "INV-007", "100.00"),
    )
    .await;
    let invoice_id = body["invoice"]["id"].as_str().unwrap().to_string();

    let res = app
        .client
        .put(app.url(&format!("/invoices/{}/status", invoice_id)))
        .bearer_auth(&tenant.org_token)
        .json(&serde_json::json!({ "status": "cancelled" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let err: serde_json::Value = res.json().await.unwrap();
    assert_error_body(&err, "Invalid status value");

    let res = app
        .client
        .put(app.url(&format!("/invoices/{}/status", invoice_id)))
        .bearer_auth(&tenant.org_token)
        .json(&serde_json::json!({ "status": "paid" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["invoice"]["status"], "paid");

    // A subsequent read reflects the new status immediately.
    let res = app
        .client
        .get(app.url(&format!("/invoices/{}", invoice_id)))
        .bearer_auth(&tenant.org_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["invoice"]["status"], "paid");

    // A facility may not change status at all.
    let res = app
        .client
        .put(app.url(&format!("/invoices/{}/status", invoice_id)))
        .bearer_auth(&tenant.facility_token)
        .json(&serde_json::json!({ "status": "disputed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);

    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM audit_logs WHERE action = 'update_invoice_status'",
    )
    .fetch_one(app.db.pool())
    .await
    .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
#[serial]
async fn get_by_id_includes_proofs_newest_first() {
    let app = TestApp::spawn().await;
    let tenant = seed_tenant(&app, "a").await;

    let (_, body) = post_invoice(
        &app,
        &tenant.org_token,
        invoice_form(tenant.facility_id, "INV-008", "100.00"),
    )
    .await;
    let invoice_id: Uuid = body["invoice"]["id"].as_str().unwrap().parse().unwrap();

    for (ref_no, uploaded) in [("REF-1", "2026-08-01T10:00:00Z"), ("REF-2", "2026-08-02T10:00:00Z")]
    {
        sqlx::query(
            "INSERT INTO payment_proofs (invoice_id, facility_id, file_path, payment_date, \
             reference_number, uploaded_at) VALUES ($1, $2, '/tmp/x', '2026-08-01', $3, $4::timestamptz)",
        )
        .bind(invoice_id)
        .bind(tenant.facility_id)
        .bind(ref_no)
        .bind(uploaded)
        .execute(app.db.pool())
        .await
        .unwrap();
    }

    let res = app
        .client
        .get(app.url(&format!("/invoices/{}", invoice_id)))
        .bearer_auth(&tenant.org_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["invoice"]["facility_name"], "Clinic a");
    assert_eq!(body["payment_proofs"][0]["reference_number"], "REF-2");
    assert_eq!(body["payment_proofs"][1]["reference_number"], "REF-1");

    // Cross-tenant read is a plain 404.
    let tenant_b = seed_tenant(&app, "b").await;
    let res = app
        .client
        .get(app.url(&format!("/invoices/{}", invoice_id)))
        .bearer_auth(&tenant_b.org_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
}

#[tokio::test]
#[serial]
async fn delete_removes_the_source_file_but_not_the_generated_pdf() {
    let app = TestApp::spawn().await;
    let tenant = seed_tenant(&app, "a").await;

    let form = invoice_form(tenant.facility_id, "INV-009", "100.00").part("file", app.pdf_part());
    let (_, body) = post_invoice(&app, &tenant.org_token, form).await;
    let invoice_id = body["invoice"]["id"].as_str().unwrap().to_string();
    let file_path = body["invoice"]["file_path"].as_str().unwrap().to_string();
    let pdf_path = body["invoice"]["generated_pdf_path"]
        .as_str()
        .unwrap()
        .to_string();

    let res = app
        .client
        .delete(app.url(&format!("/invoices/{}", invoice_id)))
        .bearer_auth(&tenant.org_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    assert!(!exists(&file_path), "Source file should be removed");
    // Generated documents are retained after deletion.
    assert!(exists(&pdf_path));
}

#[tokio::test]
#[serial]
async fn stats_aggregate_overall_and_per_facility() {
    let app = TestApp::spawn().await;
    let tenant = seed_tenant(&app, "a").await;
    // A second facility with no invoices must still show up.
    app.seed_facility(tenant.org_id, "Empty Clinic", "empty@test.test", "facility-password")
        .await;

    let (_, body) = post_invoice(
        &app,
        &tenant.org_token,
        invoice_form(tenant.facility_id, "INV-010", "500.00"),
    )
    .await;
    let invoice_id = body["invoice"]["id"].as_str().unwrap().to_string();
    post_invoice(
        &app,
        &tenant.org_token,
        invoice_form(tenant.facility_id, "INV-011", "250.00"),
    )
    .await;

    app.client
        .put(app.url(&format!("/invoices/{}/status", invoice_id)))
        .bearer_auth(&tenant.org_token)
        .json(&serde_json::json!({ "status": "paid" }))
        .send()
        .await
        .unwrap();

    let res = app
        .client
        .get(app.url("/invoices/stats"))
        .bearer_auth(&tenant.org_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();

    assert_eq!(body["overall"]["total_invoices"], 2);
    assert_eq!(body["overall"]["paid_count"], 1);
    assert_eq!(body["overall"]["pending_count"], 1);
    assert_eq!(body["overall"]["total_amount"], "750.00");
    assert_eq!(body["overall"]["paid_amount"], "500.00");

    let by_facility = body["by_facility"].as_array().unwrap();
    assert_eq!(by_facility.len(), 2);
    // Ordered by facility name: "Clinic a" before "Empty Clinic".
    assert_eq!(by_facility[0]["name"], "Clinic a");
    assert_eq!(by_facility[0]["invoice_count"], 2);
    assert_eq!(by_facility[0]["paid_count"], 1);
    assert_eq!(by_facility[1]["name"], "Empty Clinic");
    assert_eq!(by_facility[1]["invoice_count"], 0);

    // Facilities cannot see organization-wide stats.
    let res = app
        .client
        .get(app.url("/invoices/stats"))
        .bearer_auth(&tenant.facility_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
}
