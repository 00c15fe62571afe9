use chrono::Utc;
use rusqlite::{Connection, params};

use crate::crypto::{generate_api_key, hash_secret};
use crate::error::{AppError, Result};
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{
    API_KEY_COLS, BOOKING_COLS, PAYMENT_COLS, PROCESSED_EVENT_COLS, USER_COLS, query_one,
};

pub fn now() -> i64 {
    Utc::now().timestamp()
}

// ============ Users & API Keys ============

pub fn create_user(conn: &Connection, input: &CreateUser) -> Result<User> {
    input.validate()?;

    let id = EntityType::User.gen_id();
    let now = now();
    let email = input.email.trim().to_lowercase();

    conn.execute(
        "INSERT INTO users (id, email, name, role, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![&id, &email, input.name.trim(), input.role.as_ref(), now],
    )?;

    Ok(User {
        id,
        email,
        name: input.name.trim().to_string(),
        role: input.role,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let email = email.trim().to_lowercase();
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE email = ?1", USER_COLS),
        &[&email],
    )
}

pub fn set_user_role(conn: &Connection, user_id: &str, role: UserRole) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE users SET role = ?1, updated_at = ?2 WHERE id = ?3",
        params![role.as_ref(), now(), user_id],
    )?;
    Ok(affected > 0)
}

/// Make sure `email` belongs to an admin.
///
/// Creates the user with a fresh API key when missing (returning the key),
/// promotes an existing non-admin, and leaves existing admins alone.
pub fn ensure_admin_user(conn: &mut Connection, email: &str) -> Result<Option<String>> {
    let tx = conn.transaction()?;

    if let Some(user) = get_user_by_email(&tx, email)? {
        if !user.is_admin() {
            set_user_role(&tx, &user.id, UserRole::Admin)?;
            tracing::info!(user_id = %user.id, "Promoted existing user to admin");
        }
        tx.commit()?;
        return Ok(None);
    }

    let user = create_user(
        &tx,
        &CreateUser {
            email: email.to_string(),
            name: "Administrator".to_string(),
            role: UserRole::Admin,
        },
    )?;
    let (_, key) = create_api_key(&tx, &user.id)?;
    tx.commit()?;

    Ok(Some(key))
}

/// Create an API key for a user. Returns the record and the full key,
/// which is never stored and cannot be recovered later.
pub fn create_api_key(conn: &Connection, user_id: &str) -> Result<(ApiKey, String)> {
    let key = generate_api_key();
    let record = ApiKey {
        id: EntityType::ApiKey.gen_id(),
        user_id: user_id.to_string(),
        prefix: key.chars().take(11).collect(),
        key_hash: hash_secret(&key),
        created_at: now(),
        last_used_at: None,
        revoked_at: None,
    };

    conn.execute(
        "INSERT INTO api_keys (id, user_id, key_prefix, key_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            &record.id,
            &record.user_id,
            &record.prefix,
            &record.key_hash,
            record.created_at
        ],
    )?;

    Ok((record, key))
}

/// Get user by API key. Returns the user and key info if the key is valid.
pub fn get_user_by_api_key(conn: &Connection, api_key: &str) -> Result<Option<(User, ApiKey)>> {
    let hash = hash_secret(api_key);

    let key: Option<ApiKey> = query_one(
        conn,
        &format!(
            "SELECT {} FROM api_keys WHERE key_hash = ?1 AND revoked_at IS NULL",
            API_KEY_COLS
        ),
        &[&hash],
    )?;

    let Some(key) = key else {
        return Ok(None);
    };

    // Usage tracking only, failure is not an auth failure
    let _ = conn.execute(
        "UPDATE api_keys SET last_used_at = ?1 WHERE id = ?2",
        params![now(), &key.id],
    );

    Ok(get_user_by_id(conn, &key.user_id)?.map(|user| (user, key)))
}

pub fn revoke_api_key(conn: &Connection, key_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE api_keys SET revoked_at = ?1 WHERE id = ?2 AND revoked_at IS NULL",
        params![now(), key_id],
    )?;
    Ok(affected > 0)
}

// ============ Bookings ============

/// Insert a new booking in `pending_payment` state.
pub fn create_booking(conn: &Connection, input: &CreateBooking) -> Result<Booking> {
    let booking = Booking {
        id: EntityType::Booking.gen_id(),
        user_id: input.user_id.trim().to_string(),
        customer_name: input.customer_name.trim().to_string(),
        customer_email: input.customer_email.trim().to_string(),
        customer_phone: input.customer_phone.trim().to_string(),
        participants: input.participants,
        start_date: input.start_date,
        end_date: input.end_date,
        total_amount: input.total_amount,
        pickup_location: input.pickup_location.trim().to_string(),
        special_requests: input.special_requests.clone(),
        emergency_contact: input.emergency_contact.clone(),
        tour_name: input.tour_name.clone(),
        status: BookingStatus::PendingPayment,
        payment_status: BookingPaymentStatus::Pending,
        order_id: None,
        payment_id: None,
        created_at: now(),
        updated_at: now(),
        confirmed_at: None,
    };

    conn.execute(
        &format!(
            "INSERT INTO bookings ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            BOOKING_COLS
        ),
        params![
            &booking.id,
            &booking.user_id,
            &booking.customer_name,
            &booking.customer_email,
            &booking.customer_phone,
            booking.participants,
            booking.start_date,
            booking.end_date,
            booking.total_amount,
            &booking.pickup_location,
            &booking.special_requests,
            &booking.emergency_contact,
            &booking.tour_name,
            booking.status.as_ref(),
            booking.payment_status.as_ref(),
            &booking.order_id,
            &booking.payment_id,
            booking.created_at,
            booking.updated_at,
            booking.confirmed_at,
        ],
    )?;

    Ok(booking)
}

pub fn get_booking(conn: &Connection, id: &str) -> Result<Option<Booking>> {
    query_one(
        conn,
        &format!("SELECT {} FROM bookings WHERE id = ?1", BOOKING_COLS),
        &[&id],
    )
}

/// Link a booking to its gateway order.
pub fn set_booking_order(conn: &Connection, booking_id: &str, order_id: &str) -> Result<()> {
    let affected = conn.execute(
        "UPDATE bookings SET order_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![order_id, now(), booking_id],
    )?;
    if affected == 0 {
        return Err(AppError::DataIntegrity(format!(
            "booking {} vanished before order {} could be linked",
            booking_id, order_id
        )));
    }
    Ok(())
}

/// Write the booking side of a payment transition.
///
/// `payment_id` is only overwritten when provided. `confirmed_at` is stamped
/// the first time the booking reaches `confirmed`.
pub fn update_booking_payment_state(
    conn: &Connection,
    booking_id: &str,
    status: BookingStatus,
    payment_status: BookingPaymentStatus,
    payment_id: Option<&str>,
) -> Result<bool> {
    let now = now();
    let affected = conn.execute(
        "UPDATE bookings SET
            status = ?1,
            payment_status = ?2,
            payment_id = COALESCE(?3, payment_id),
            confirmed_at = CASE WHEN ?1 = 'confirmed' THEN COALESCE(confirmed_at, ?4) ELSE confirmed_at END,
            updated_at = ?4
         WHERE id = ?5",
        params![status.as_ref(), payment_status.as_ref(), payment_id, now, booking_id],
    )?;
    Ok(affected > 0)
}

// ============ Payments ============

/// Insert a payment record keyed by the gateway order ID.
pub fn create_payment(
    conn: &Connection,
    order_id: &str,
    booking_id: &str,
    amount: i64,
    currency: &str,
) -> Result<Payment> {
    let now = now();
    conn.execute(
        "INSERT INTO payments (id, booking_id, amount, currency, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![order_id, booking_id, amount, currency, PaymentStatus::Created.as_ref(), now],
    )?;

    Ok(Payment {
        id: order_id.to_string(),
        booking_id: booking_id.to_string(),
        amount,
        currency: currency.to_string(),
        status: PaymentStatus::Created,
        payment_id: None,
        refund_id: None,
        failure_reason: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_payment(conn: &Connection, order_id: &str) -> Result<Option<Payment>> {
    query_one(
        conn,
        &format!("SELECT {} FROM payments WHERE id = ?1", PAYMENT_COLS),
        &[&order_id],
    )
}

/// Look up a payment by the gateway's payment ID (used for refunds).
pub fn get_payment_by_gateway_id(conn: &Connection, payment_id: &str) -> Result<Option<Payment>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM payments WHERE payment_id = ?1 ORDER BY updated_at DESC LIMIT 1",
            PAYMENT_COLS
        ),
        &[&payment_id],
    )
}

/// Fields written by a payment transition. `None` leaves the column untouched.
#[derive(Debug, Default)]
pub struct PaymentUpdate<'a> {
    pub payment_id: Option<&'a str>,
    pub refund_id: Option<&'a str>,
    pub failure_reason: Option<&'a str>,
}

pub fn update_payment_status(
    conn: &Connection,
    order_id: &str,
    status: PaymentStatus,
    update: &PaymentUpdate<'_>,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE payments SET
            status = ?1,
            payment_id = COALESCE(?2, payment_id),
            refund_id = COALESCE(?3, refund_id),
            failure_reason = COALESCE(?4, failure_reason),
            updated_at = ?5
         WHERE id = ?6",
        params![
            status.as_ref(),
            update.payment_id,
            update.refund_id,
            update.failure_reason,
            now(),
            order_id
        ],
    )?;
    Ok(affected > 0)
}

// ============ Processed Events ============

/// Atomically record a gateway event as processed.
/// Returns true if this call recorded it, false if it was already present.
pub fn try_record_processed_event(conn: &Connection, event_id: &str, event_type: &str) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO processed_events (event_id, event_type, processed_at) VALUES (?1, ?2, ?3)",
        params![event_id, event_type, now()],
    )?;
    Ok(affected > 0)
}

pub fn get_processed_event(conn: &Connection, event_id: &str) -> Result<Option<ProcessedEvent>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM processed_events WHERE event_id = ?1",
            PROCESSED_EVENT_COLS
        ),
        &[&event_id],
    )
}
