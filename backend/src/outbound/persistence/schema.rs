//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Payout ledger rows.
    payouts (id) {
        /// Surrogate key, also the source of the provider reference.
        id -> Int8,
        /// Owning user.
        user_id -> Uuid,
        /// Amount with two decimal places.
        amount -> Numeric,
        /// ISO 4217 code.
        currency -> Varchar,
        /// `processing`, `paid`, or `failed`.
        status -> Varchar,
        /// Reference returned by the payment provider.
        provider_ref -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Idempotency key claims; the primary key is the mutex.
    idempotency_keys (key) {
        key -> Varchar,
        owner_user_id -> Uuid,
        /// Set once the winning request has persisted its payout.
        payout_id -> Nullable<Int8>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Processed provider webhook deliveries, one row per event id.
    webhook_events (event_id) {
        event_id -> Varchar,
        raw_payload -> Text,
        received_at -> Timestamptz,
    }
}

diesel::joinable!(idempotency_keys -> payouts (payout_id));
diesel::allow_tables_to_appear_in_same_query!(idempotency_keys, payouts, webhook_events);
