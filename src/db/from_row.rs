//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors.
///
/// A corrupted status column surfaces as a query error instead of a panic.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str = "id, email, name, role, created_at, updated_at";

pub const API_KEY_COLS: &str =
    "id, user_id, key_prefix, key_hash, created_at, last_used_at, revoked_at";

pub const BOOKING_COLS: &str = "id, user_id, customer_name, customer_email, customer_phone, participants, start_date, end_date, total_amount, pickup_location, special_requests, emergency_contact, tour_name, status, payment_status, order_id, payment_id, created_at, updated_at, confirmed_at";

pub const PAYMENT_COLS: &str = "id, booking_id, amount, currency, status, payment_id, refund_id, failure_reason, created_at, updated_at";

pub const PROCESSED_EVENT_COLS: &str = "event_id, event_type, processed_at";

// ============ FromRow Implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            role: parse_enum(row, 3, "role")?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl FromRow for ApiKey {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ApiKey {
            id: row.get(0)?,
            user_id: row.get(1)?,
            prefix: row.get(2)?,
            key_hash: row.get(3)?,
            created_at: row.get(4)?,
            last_used_at: row.get(5)?,
            revoked_at: row.get(6)?,
        })
    }
}

impl FromRow for Booking {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Booking {
            id: row.get(0)?,
            user_id: row.get(1)?,
            customer_name: row.get(2)?,
            customer_email: row.get(3)?,
            customer_phone: row.get(4)?,
            participants: row.get(5)?,
            start_date: row.get(6)?,
            end_date: row.get(7)?,
            total_amount: row.get(8)?,
            pickup_location: row.get(9)?,
            special_requests: row.get(10)?,
            emergency_contact: row.get(11)?,
            tour_name: row.get(12)?,
            status: parse_enum(row, 13, "status")?,
            payment_status: parse_enum(row, 14, "payment_status")?,
            order_id: row.get(15)?,
            payment_id: row.get(16)?,
            created_at: row.get(17)?,
            updated_at: row.get(18)?,
            confirmed_at: row.get(19)?,
        })
    }
}

impl FromRow for Payment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Payment {
            id: row.get(0)?,
            booking_id: row.get(1)?,
            amount: row.get(2)?,
            currency: row.get(3)?,
            status: parse_enum(row, 4, "status")?,
            payment_id: row.get(5)?,
            refund_id: row.get(6)?,
            failure_reason: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl FromRow for ProcessedEvent {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ProcessedEvent {
            event_id: row.get(0)?,
            event_type: row.get(1)?,
            processed_at: row.get(2)?,
        })
    }
}
