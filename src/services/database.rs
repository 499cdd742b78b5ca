//! Postgres access layer for the invoicing portal.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    AuditEntry, CreateFacility, CreateInvoice, CreatePaymentProof, Facility,
    FacilityInvoiceStats, FacilityPublic, Invoice, InvoiceTotals, Organization, PaymentProof,
    UpdateFacility,
};
use crate::services::metrics::DB_QUERY_DURATION;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Wrap an existing pool, used by integration tests.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Account Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, email))]
    pub async fn find_organization_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Organization>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_organization_by_email"])
            .start_timer();

        let org = sqlx::query_as::<_, Organization>(
            "SELECT id, name, email, password_hash, created_at, updated_at \
             FROM organizations WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to look up organization: {}", e))
        })?;

        timer.observe_duration();

        Ok(org)
    }

    #[instrument(skip(self, email))]
    pub async fn find_facility_by_email(&self, email: &str) -> Result<Option<Facility>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_facility_by_email"])
            .start_timer();

        let facility = sqlx::query_as::<_, Facility>(
            "SELECT id, organization_id, name, email, password_hash, contact_person, phone, \
                    address, billing_period, created_at, updated_at \
             FROM facilities WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to look up facility: {}", e))
        })?;

        timer.observe_duration();

        Ok(facility)
    }

    #[instrument(skip(self), fields(organization_id = %id))]
    pub async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_organization"])
            .start_timer();

        let org = sqlx::query_as::<_, Organization>(
            "SELECT id, name, email, password_hash, created_at, updated_at \
             FROM organizations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get organization: {}", e))
        })?;

        timer.observe_duration();

        Ok(org)
    }

    #[instrument(skip(self), fields(facility_id = %id))]
    pub async fn get_facility(&self, id: Uuid) -> Result<Option<Facility>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_facility"])
            .start_timer();

        let facility = sqlx::query_as::<_, Facility>(
            "SELECT id, organization_id, name, email, password_hash, contact_person, phone, \
                    address, billing_period, created_at, updated_at \
             FROM facilities WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get facility: {}", e)))?;

        timer.observe_duration();

        Ok(facility)
    }

    /// True when the email is already taken by either account kind.
    /// Logins resolve across both tables, so an address must be unique
    /// across both.
    #[instrument(skip(self, email))]
    pub async fn email_in_use(&self, email: &str) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["email_in_use"])
            .start_timer();

        let (in_use,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM organizations WHERE email = $1) \
                 OR EXISTS(SELECT 1 FROM facilities WHERE email = $1)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to check email: {}", e)))?;

        timer.observe_duration();

        Ok(in_use)
    }

    // -------------------------------------------------------------------------
    // Facility Operations
    // -------------------------------------------------------------------------

    /// Create a facility account.
    #[instrument(skip(self, input), fields(organization_id = %input.organization_id))]
    pub async fn create_facility(&self, input: &CreateFacility) -> Result<FacilityPublic, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_facility"])
            .start_timer();

        let facility = sqlx::query_as::<_, FacilityPublic>(
            r#"
            INSERT INTO facilities (organization_id, name, email, password_hash, contact_person, phone, address, billing_period)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, name, email, contact_person, phone, address, billing_period, created_at
            "#,
        )
        .bind(input.organization_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.password_hash)
        .bind(&input.contact_person)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(&input.billing_period)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Email already exists"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create facility: {}", e)),
        })?;

        timer.observe_duration();

        info!(facility_id = %facility.id, "Facility created");

        Ok(facility)
    }

    /// List an organization's facilities, ordered by name.
    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn list_facilities(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<FacilityPublic>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_facilities"])
            .start_timer();

        let facilities = sqlx::query_as::<_, FacilityPublic>(
            "SELECT id, name, email, contact_person, phone, address, billing_period, created_at \
             FROM facilities WHERE organization_id = $1 ORDER BY name ASC",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list facilities: {}", e))
        })?;

        timer.observe_duration();

        Ok(facilities)
    }

    /// Fetch one facility within the caller's scope: an organization
    /// sees its own facilities, a facility sees only itself.
    #[instrument(skip(self), fields(facility_id = %id))]
    pub async fn get_facility_scoped(
        &self,
        id: Uuid,
        organization_id: Option<Uuid>,
        self_id: Option<Uuid>,
    ) -> Result<Option<FacilityPublic>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_facility_scoped"])
            .start_timer();

        let query = match (organization_id, self_id) {
            (Some(org_id), None) => sqlx::query_as::<_, FacilityPublic>(
                "SELECT id, name, email, contact_person, phone, address, billing_period, created_at \
                 FROM facilities WHERE id = $1 AND organization_id = $2",
            )
            .bind(id)
            .bind(org_id),
            (None, Some(own_id)) => sqlx::query_as::<_, FacilityPublic>(
                "SELECT id, name, email, contact_person, phone, address, billing_period, created_at \
                 FROM facilities WHERE id = $1 AND id = $2",
            )
            .bind(id)
            .bind(own_id),
            _ => return Ok(None),
        };

        let facility = query.fetch_optional(&self.pool).await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get facility: {}", e))
        })?;

        timer.observe_duration();

        Ok(facility)
    }

    /// Merge-patch update of a facility owned by the organization.
    #[instrument(skip(self, input), fields(facility_id = %id, organization_id = %organization_id))]
    pub async fn update_facility(
        &self,
        id: Uuid,
        organization_id: Uuid,
        input: &UpdateFacility,
    ) -> Result<Option<FacilityPublic>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_facility"])
            .start_timer();

        let facility = sqlx::query_as::<_, FacilityPublic>(
            r#"
            UPDATE facilities
            SET name = COALESCE($3, name),
                contact_person = COALESCE($4, contact_person),
                phone = COALESCE($5, phone),
                address = COALESCE($6, address),
                billing_period = COALESCE($7, billing_period),
                updated_at = NOW()
            WHERE id = $1 AND organization_id = $2
            RETURNING id, name, email, contact_person, phone, address, billing_period, created_at
            "#,
        )
        .bind(id)
        .bind(organization_id)
        .bind(&input.name)
        .bind(&input.contact_person)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(&input.billing_period)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update facility: {}", e))
        })?;

        timer.observe_duration();

        Ok(facility)
    }

    /// Delete a facility owned by the organization. Fails with a
    /// conflict while invoices still reference it (FK RESTRICT).
    #[instrument(skip(self), fields(facility_id = %id, organization_id = %organization_id))]
    pub async fn delete_facility(
        &self,
        id: Uuid,
        organization_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_facility"])
            .start_timer();

        let result = sqlx::query("DELETE FROM facilities WHERE id = $1 AND organization_id = $2")
            .bind(id)
            .bind(organization_id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                    AppError::Conflict(anyhow::anyhow!(
                        "Cannot delete a facility with existing invoices"
                    ))
                }
                _ => AppError::DatabaseError(anyhow::anyhow!("Failed to delete facility: {}", e)),
            })?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, invoice_number))]
    pub async fn invoice_number_exists(&self, invoice_number: &str) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["invoice_number_exists"])
            .start_timer();

        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM invoices WHERE invoice_number = $1)")
                .bind(invoice_number)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!(
                        "Failed to check invoice number: {}",
                        e
                    ))
                })?;

        timer.observe_duration();

        Ok(exists)
    }

    /// Fetch a facility only if the organization owns it.
    #[instrument(skip(self), fields(facility_id = %facility_id, organization_id = %organization_id))]
    pub async fn get_owned_facility(
        &self,
        facility_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<Facility>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_owned_facility"])
            .start_timer();

        let facility = sqlx::query_as::<_, Facility>(
            "SELECT id, organization_id, name, email, password_hash, contact_person, phone, \
                    address, billing_period, created_at, updated_at \
             FROM facilities WHERE id = $1 AND organization_id = $2",
        )
        .bind(facility_id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get facility: {}", e)))?;

        timer.observe_duration();

        Ok(facility)
    }

    /// Insert an invoice. Always created as pending; the unique index
    /// on invoice_number is the authority under concurrent creates.
    #[instrument(skip(self, input), fields(invoice_number = %input.invoice_number))]
    pub async fn create_invoice(&self, input: &CreateInvoice) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (organization_id, facility_id, invoice_number, amount, due_date,
                                  billing_period, period_start, period_end, status, file_path,
                                  generated_pdf_path, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', $9, $10, $11)
            RETURNING id, organization_id, facility_id, invoice_number, amount, due_date,
                      billing_period, period_start, period_end, status, file_path,
                      generated_pdf_path, notes, created_at, updated_at
            "#,
        )
        .bind(input.organization_id)
        .bind(input.facility_id)
        .bind(&input.invoice_number)
        .bind(input.amount)
        .bind(input.due_date)
        .bind(input.billing_period.as_str())
        .bind(input.period_start)
        .bind(input.period_end)
        .bind(&input.file_path)
        .bind(&input.generated_pdf_path)
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Invoice number already exists"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)),
        })?;

        timer.observe_duration();

        info!(invoice_id = %invoice.id, invoice_number = %invoice.invoice_number, "Invoice created");

        Ok(invoice)
    }

    /// List an organization's invoices, newest due date first, with the
    /// counterparty facility name joined in.
    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn list_invoices_for_org(
        &self,
        organization_id: Uuid,
        status: Option<&str>,
        facility_id: Option<Uuid>,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices_for_org"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT i.id, i.organization_id, i.facility_id, i.invoice_number, i.amount, i.due_date,
                   i.billing_period, i.period_start, i.period_end, i.status, i.file_path,
                   i.generated_pdf_path, i.notes, i.created_at, i.updated_at,
                   f.name AS facility_name
            FROM invoices i
            JOIN facilities f ON f.id = i.facility_id
            WHERE i.organization_id = $1
              AND ($2::text IS NULL OR i.status = $2)
              AND ($3::uuid IS NULL OR i.facility_id = $3)
            ORDER BY i.due_date DESC
            "#,
        )
        .bind(organization_id)
        .bind(status)
        .bind(facility_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// List the invoices issued to one facility, with the issuing
    /// organization name joined in.
    #[instrument(skip(self), fields(facility_id = %facility_id))]
    pub async fn list_invoices_for_facility(
        &self,
        facility_id: Uuid,
        status: Option<&str>,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices_for_facility"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT i.id, i.organization_id, i.facility_id, i.invoice_number, i.amount, i.due_date,
                   i.billing_period, i.period_start, i.period_end, i.status, i.file_path,
                   i.generated_pdf_path, i.notes, i.created_at, i.updated_at,
                   o.name AS organization_name
            FROM invoices i
            JOIN organizations o ON o.id = i.organization_id
            WHERE i.facility_id = $1
              AND ($2::text IS NULL OR i.status = $2)
            ORDER BY i.due_date DESC
            "#,
        )
        .bind(facility_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    #[instrument(skip(self), fields(invoice_id = %id, organization_id = %organization_id))]
    pub async fn get_invoice_for_org(
        &self,
        id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice_for_org"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT i.id, i.organization_id, i.facility_id, i.invoice_number, i.amount, i.due_date,
                   i.billing_period, i.period_start, i.period_end, i.status, i.file_path,
                   i.generated_pdf_path, i.notes, i.created_at, i.updated_at,
                   f.name AS facility_name, f.email AS facility_email
            FROM invoices i
            JOIN facilities f ON f.id = i.facility_id
            WHERE i.id = $1 AND i.organization_id = $2
            "#,
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    #[instrument(skip(self), fields(invoice_id = %id, facility_id = %facility_id))]
    pub async fn get_invoice_for_facility(
        &self,
        id: Uuid,
        facility_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice_for_facility"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT i.id, i.organization_id, i.facility_id, i.invoice_number, i.amount, i.due_date,
                   i.billing_period, i.period_start, i.period_end, i.status, i.file_path,
                   i.generated_pdf_path, i.notes, i.created_at, i.updated_at,
                   o.name AS organization_name, o.email AS organization_email
            FROM invoices i
            JOIN organizations o ON o.id = i.organization_id
            WHERE i.id = $1 AND i.facility_id = $2
            "#,
        )
        .bind(id)
        .bind(facility_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// Update an invoice's status. The caller validates the status
    /// string against the known set before this runs.
    #[instrument(skip(self), fields(invoice_id = %id, organization_id = %organization_id, status = status))]
    pub async fn update_invoice_status(
        &self,
        id: Uuid,
        organization_id: Uuid,
        status: &str,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice_status"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND organization_id = $2
            RETURNING id, organization_id, facility_id, invoice_number, amount, due_date,
                      billing_period, period_start, period_end, status, file_path,
                      generated_pdf_path, notes, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(organization_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice status: {}", e))
        })?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// Delete an invoice; attached payment proofs cascade.
    #[instrument(skip(self), fields(invoice_id = %id, organization_id = %organization_id))]
    pub async fn delete_invoice(&self, id: Uuid, organization_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let result = sqlx::query("DELETE FROM invoices WHERE id = $1 AND organization_id = $2")
            .bind(id)
            .bind(organization_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e))
            })?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    /// Organization-wide invoice aggregates.
    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn invoice_totals(&self, organization_id: Uuid) -> Result<InvoiceTotals, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["invoice_totals"])
            .start_timer();

        let totals = sqlx::query_as::<_, InvoiceTotals>(
            r#"
            SELECT COUNT(*) AS total_invoices,
                   COUNT(*) FILTER (WHERE status = 'pending') AS pending_count,
                   COUNT(*) FILTER (WHERE status = 'paid') AS paid_count,
                   COUNT(*) FILTER (WHERE status = 'overdue') AS overdue_count,
                   COUNT(*) FILTER (WHERE status = 'disputed') AS disputed_count,
                   COALESCE(SUM(amount), 0) AS total_amount,
                   COALESCE(SUM(amount) FILTER (WHERE status = 'pending'), 0) AS pending_amount,
                   COALESCE(SUM(amount) FILTER (WHERE status = 'paid'), 0) AS paid_amount
            FROM invoices
            WHERE organization_id = $1
            "#,
        )
        .bind(organization_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to aggregate invoices: {}", e))
        })?;

        timer.observe_duration();

        Ok(totals)
    }

    /// Per-facility invoice breakdown. Facilities without invoices
    /// still appear, with zero counts.
    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn facility_invoice_stats(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<FacilityInvoiceStats>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["facility_invoice_stats"])
            .start_timer();

        let rows = sqlx::query_as::<_, FacilityInvoiceStats>(
            r#"
            SELECT f.id, f.name,
                   COUNT(i.id) AS invoice_count,
                   COUNT(i.id) FILTER (WHERE i.status = 'paid') AS paid_count,
                   COALESCE(SUM(i.amount), 0) AS total_amount,
                   COALESCE(SUM(i.amount) FILTER (WHERE i.status = 'paid'), 0) AS paid_amount
            FROM facilities f
            LEFT JOIN invoices i ON i.facility_id = f.id
            WHERE f.organization_id = $1
            GROUP BY f.id, f.name
            ORDER BY f.name ASC
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to aggregate facilities: {}", e))
        })?;

        timer.observe_duration();

        Ok(rows)
    }

    // -------------------------------------------------------------------------
    // Payment Proof Operations
    // -------------------------------------------------------------------------

    /// True when the invoice was issued to the facility.
    #[instrument(skip(self), fields(invoice_id = %invoice_id, facility_id = %facility_id))]
    pub async fn invoice_owned_by_facility(
        &self,
        invoice_id: Uuid,
        facility_id: Uuid,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["invoice_owned_by_facility"])
            .start_timer();

        let (owned,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM invoices WHERE id = $1 AND facility_id = $2)",
        )
        .bind(invoice_id)
        .bind(facility_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to check invoice ownership: {}", e))
        })?;

        timer.observe_duration();

        Ok(owned)
    }

    #[instrument(skip(self, input), fields(invoice_id = %input.invoice_id))]
    pub async fn create_payment_proof(
        &self,
        input: &CreatePaymentProof,
    ) -> Result<PaymentProof, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_payment_proof"])
            .start_timer();

        let proof = sqlx::query_as::<_, PaymentProof>(
            r#"
            INSERT INTO payment_proofs (invoice_id, facility_id, file_path, payment_date,
                                        payment_method, reference_number, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, invoice_id, facility_id, file_path, payment_date, payment_method,
                      reference_number, notes, uploaded_at
            "#,
        )
        .bind(input.invoice_id)
        .bind(input.facility_id)
        .bind(&input.file_path)
        .bind(input.payment_date)
        .bind(&input.payment_method)
        .bind(&input.reference_number)
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to record payment proof: {}", e))
        })?;

        timer.observe_duration();

        info!(proof_id = %proof.id, "Payment proof recorded");

        Ok(proof)
    }

    /// Proofs attached to one invoice, newest first. The caller has
    /// already verified the invoice is in scope.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn list_proofs_for_invoice(
        &self,
        invoice_id: Uuid,
    ) -> Result<Vec<PaymentProof>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_proofs_for_invoice"])
            .start_timer();

        let proofs = sqlx::query_as::<_, PaymentProof>(
            "SELECT id, invoice_id, facility_id, file_path, payment_date, payment_method, \
                    reference_number, notes, uploaded_at \
             FROM payment_proofs WHERE invoice_id = $1 ORDER BY uploaded_at DESC",
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list payment proofs: {}", e))
        })?;

        timer.observe_duration();

        Ok(proofs)
    }

    /// Proofs for one invoice when the caller is the issuing organization.
    #[instrument(skip(self), fields(invoice_id = %invoice_id, organization_id = %organization_id))]
    pub async fn list_invoice_proofs_for_org(
        &self,
        invoice_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Vec<PaymentProof>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoice_proofs_for_org"])
            .start_timer();

        let proofs = sqlx::query_as::<_, PaymentProof>(
            r#"
            SELECT p.id, p.invoice_id, p.facility_id, p.file_path, p.payment_date,
                   p.payment_method, p.reference_number, p.notes, p.uploaded_at,
                   i.invoice_number, f.name AS facility_name
            FROM payment_proofs p
            JOIN invoices i ON i.id = p.invoice_id
            JOIN facilities f ON f.id = p.facility_id
            WHERE p.invoice_id = $1 AND i.organization_id = $2
            ORDER BY p.uploaded_at DESC
            "#,
        )
        .bind(invoice_id)
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list payment proofs: {}", e))
        })?;

        timer.observe_duration();

        Ok(proofs)
    }

    /// Proofs for one invoice when the caller is the billed facility.
    #[instrument(skip(self), fields(invoice_id = %invoice_id, facility_id = %facility_id))]
    pub async fn list_invoice_proofs_for_facility(
        &self,
        invoice_id: Uuid,
        facility_id: Uuid,
    ) -> Result<Vec<PaymentProof>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoice_proofs_for_facility"])
            .start_timer();

        let proofs = sqlx::query_as::<_, PaymentProof>(
            r#"
            SELECT p.id, p.invoice_id, p.facility_id, p.file_path, p.payment_date,
                   p.payment_method, p.reference_number, p.notes, p.uploaded_at,
                   i.invoice_number
            FROM payment_proofs p
            JOIN invoices i ON i.id = p.invoice_id
            WHERE p.invoice_id = $1 AND p.facility_id = $2
            ORDER BY p.uploaded_at DESC
            "#,
        )
        .bind(invoice_id)
        .bind(facility_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list payment proofs: {}", e))
        })?;

        timer.observe_duration();

        Ok(proofs)
    }

    /// Every proof across the organization's invoices, newest first.
    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn list_all_proofs(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<PaymentProof>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_all_proofs"])
            .start_timer();

        let proofs = sqlx::query_as::<_, PaymentProof>(
            r#"
            SELECT p.id, p.invoice_id, p.facility_id, p.file_path, p.payment_date,
                   p.payment_method, p.reference_number, p.notes, p.uploaded_at,
                   i.invoice_number, i.amount, f.name AS facility_name
            FROM payment_proofs p
            JOIN invoices i ON i.id = p.invoice_id
            JOIN facilities f ON f.id = p.facility_id
            WHERE i.organization_id = $1
            ORDER BY p.uploaded_at DESC
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list payment proofs: {}", e))
        })?;

        timer.observe_duration();

        Ok(proofs)
    }

    /// Delete a proof on an invoice the organization issued, returning
    /// its stored file path for cleanup.
    #[instrument(skip(self), fields(proof_id = %id, organization_id = %organization_id))]
    pub async fn delete_proof_for_org(
        &self,
        id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<String>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_proof_for_org"])
            .start_timer();

        let file_path: Option<(String,)> = sqlx::query_as(
            r#"
            DELETE FROM payment_proofs p
            USING invoices i
            WHERE p.id = $1 AND i.id = p.invoice_id AND i.organization_id = $2
            RETURNING p.file_path
            "#,
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to delete payment proof: {}", e))
        })?;

        timer.observe_duration();

        Ok(file_path.map(|(p,)| p))
    }

    /// Delete a proof the facility itself uploaded, returning its
    /// stored file path for cleanup.
    #[instrument(skip(self), fields(proof_id = %id, facility_id = %facility_id))]
    pub async fn delete_proof_for_facility(
        &self,
        id: Uuid,
        facility_id: Uuid,
    ) -> Result<Option<String>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_proof_for_facility"])
            .start_timer();

        let file_path: Option<(String,)> = sqlx::query_as(
            "DELETE FROM payment_proofs WHERE id = $1 AND facility_id = $2 RETURNING file_path",
        )
        .bind(id)
        .bind(facility_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to delete payment proof: {}", e))
        })?;

        timer.observe_duration();

        Ok(file_path.map(|(p,)| p))
    }

    // -------------------------------------------------------------------------
    // Audit Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, entry), fields(action = entry.action))]
    pub async fn insert_audit(&self, entry: &AuditEntry) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_audit"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO audit_logs (user_id, user_role, action, entity_type, entity_id, details, ip_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.user_role.as_str())
        .bind(entry.action)
        .bind(entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.details)
        .bind(&entry.ip_address)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert audit entry: {}", e))
        })?;

        timer.observe_duration();

        Ok(())
    }
}
