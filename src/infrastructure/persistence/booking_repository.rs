//! PostgreSQL implementation of the booking store
//!
//! Creation locks only the rows its overlap predicate matches, so creates
//! for disjoint slots on the same court never wait on each other. Two
//! creates racing into an empty neighbourhood lock nothing; the
//! `bookings_no_overlap` exclusion constraint lets the first commit win and
//! fails the other with SQLSTATE 23P01, reported as `OverlapConflict`.

use crate::domain::booking::{
    Booking, BookingFilter, BookingStatus, BookingStore, ConfirmOutcome, PageRequest,
    ProcessedEvent, StatusChange, TimeRange, Transition,
};
use crate::domain::shared::{BookingId, DomainError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::{debug, error, warn};
use uuid::Uuid;

/// SQLSTATE exclusion_violation
const EXCLUSION_VIOLATION: &str = "23P01";
/// SQLSTATE check_violation
const CHECK_VIOLATION: &str = "23514";
const RANGE_CONSTRAINT: &str = "bookings_range_valid";

const BOOKING_COLUMNS: &str =
    "id, requester_id, resource_id, start_time, end_time, status, created_at, updated_at";

#[derive(FromRow)]
struct BookingRow {
    id: Uuid,
    requester_id: String,
    resource_id: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = DomainError;

    fn try_from(r: BookingRow) -> Result<Self> {
        let status = BookingStatus::from_str(&r.status).ok_or_else(|| {
            DomainError::StorageUnavailable(format!("Unknown booking status in storage: {}", r.status))
        })?;
        Ok(Booking::restore(
            BookingId::from_uuid(r.id),
            r.requester_id,
            r.resource_id,
            TimeRange::new(r.start_time, r.end_time)?,
            status,
            r.created_at,
            r.updated_at,
        ))
    }
}

#[derive(FromRow)]
struct ProcessedEventRow {
    event_id: String,
    event_kind: String,
    processed_at: DateTime<Utc>,
}

impl From<ProcessedEventRow> for ProcessedEvent {
    fn from(r: ProcessedEventRow) -> Self {
        ProcessedEvent {
            event_id: r.event_id,
            event_kind: r.event_kind,
            processed_at: r.processed_at,
        }
    }
}

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(ref db) = e {
        match db.code().as_deref() {
            Some(EXCLUSION_VIOLATION) => return DomainError::OverlapConflict,
            Some(CHECK_VIOLATION) if db.constraint() == Some(RANGE_CONSTRAINT) => {
                return DomainError::InvalidRange
            }
            _ => {}
        }
    }
    error!("{}: {}", context, e);
    DomainError::StorageUnavailable(format!("{}: {}", context, e))
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &BookingFilter) {
    builder.push(" WHERE TRUE");
    if let Some(ref requester_id) = filter.requester_id {
        builder.push(" AND requester_id = ").push_bind(requester_id.clone());
    }
    if let Some(ref resource_id) = filter.resource_id {
        builder.push(" AND resource_id = ").push_bind(resource_id.clone());
    }
    if let Some(ref window) = filter.window {
        builder
            .push(" AND start_time < ")
            .push_bind(window.end())
            .push(" AND end_time > ")
            .push_bind(window.start());
    }
}

pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_booking(conn: &mut PgConnection, id: &BookingId) -> Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1 FOR UPDATE",
            BOOKING_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| db_error("Failed to lock booking", e))?;

        row.map(Booking::try_from).transpose()
    }

    async fn write_status(conn: &mut PgConnection, booking: &Booking) -> Result<()> {
        sqlx::query("UPDATE bookings SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(booking.id().as_uuid())
            .bind(booking.status().as_str())
            .bind(*booking.updated_at())
            .execute(&mut *conn)
            .await
            .map_err(|e| db_error("Failed to update booking status", e))?;
        Ok(())
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn create_without_overlap(&self, booking: &Booking) -> Result<()> {
        debug!(
            resource_id = %booking.resource_id(),
            start = %booking.range().start(),
            end = %booking.range().end(),
            "Creating booking"
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        let conflicting: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM bookings
            WHERE resource_id = $1
              AND status IN ('PENDING', 'CONFIRMED')
              AND start_time < $3
              AND end_time > $2
            FOR UPDATE
            "#,
        )
        .bind(booking.resource_id())
        .bind(booking.range().start())
        .bind(booking.range().end())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to check for overlapping bookings", e))?;

        if !conflicting.is_empty() {
            debug!(resource_id = %booking.resource_id(), conflicts = conflicting.len(), "Overlap detected");
            return Err(DomainError::OverlapConflict);
        }

        sqlx::query(
            r#"
            INSERT INTO bookings (id, requester_id, resource_id, start_time, end_time, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(booking.id().as_uuid())
        .bind(booking.requester_id())
        .bind(booking.resource_id())
        .bind(booking.range().start())
        .bind(booking.range().end())
        .bind(booking.status().as_str())
        .bind(*booking.created_at())
        .bind(*booking.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to insert booking", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit booking", e))?;

        debug!("Booking created: {}", booking.id());
        Ok(())
    }

    async fn find_by_id(&self, id: &BookingId) -> Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to get booking", e))?;

        row.map(Booking::try_from).transpose()
    }

    async fn update_status(&self, id: &BookingId, status: BookingStatus) -> Result<StatusChange> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        let mut booking = Self::lock_booking(&mut *tx, id)
            .await?
            .ok_or_else(|| DomainError::NotFound(id.to_string()))?;

        let transition = booking.transition_to(status)?;
        if transition == Transition::Changed {
            Self::write_status(&mut *tx, &booking).await?;
        }

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit status change", e))?;

        Ok(StatusChange { booking, transition })
    }

    async fn confirm_if_not_processed(
        &self,
        booking_id: &BookingId,
        event_id: &str,
        event_kind: &str,
    ) -> Result<ConfirmOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        let seen: Option<(String,)> =
            sqlx::query_as("SELECT event_id FROM processed_events WHERE event_id = $1")
                .bind(event_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| db_error("Failed to read processed events", e))?;

        let mut booking = Self::lock_booking(&mut *tx, booking_id)
            .await?
            .ok_or_else(|| DomainError::BookingNotFound(booking_id.to_string()))?;

        if seen.is_some() {
            debug!(event_id = %event_id, "Event already processed");
            return Ok(ConfirmOutcome::Duplicate(booking));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, event_kind, processed_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(event_kind)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to record processed event", e))?;

        if inserted.rows_affected() == 0 {
            // Another consumer committed the same event after our check
            return Ok(ConfirmOutcome::Duplicate(booking));
        }

        let outcome = if booking.status() == BookingStatus::Pending {
            booking.confirm()?;
            Self::write_status(&mut *tx, &booking).await?;
            ConfirmOutcome::Applied(booking)
        } else {
            warn!(
                booking_id = %booking_id,
                status = booking.status().as_str(),
                "Payment for booking that is not pending"
            );
            ConfirmOutcome::Unchanged(booking)
        };

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit confirmation", e))?;

        Ok(outcome)
    }

    async fn list(&self, filter: &BookingFilter, page: PageRequest) -> Result<(Vec<Booking>, i64)> {
        debug!("Listing bookings with filter: {:?}", filter);

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM bookings");
        push_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Failed to count bookings", e))?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM bookings", BOOKING_COLUMNS));
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY start_time ASC, id ASC LIMIT ")
            .push_bind(page.page_size)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<BookingRow> = select
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list bookings", e))?;

        let bookings = rows
            .into_iter()
            .map(Booking::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok((bookings, total))
    }

    async fn find_processed_event(&self, event_id: &str) -> Result<Option<ProcessedEvent>> {
        let row = sqlx::query_as::<_, ProcessedEventRow>(
            "SELECT event_id, event_kind, processed_at FROM processed_events WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to read processed event", e))?;

        Ok(row.map(Into::into))
    }
}
