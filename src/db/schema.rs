pub const SCHEMA_VERSION: i32 = 2;

pub const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS master_contracts (
    id TEXT PRIMARY KEY,
    client_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'Draft',
    period_start TEXT,
    period_end TEXT,
    value TEXT,
    billing_day TEXT,
    currency TEXT,
    payment_terms TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_msa_client ON master_contracts(client_id);

CREATE TABLE IF NOT EXISTS sow_contracts (
    id TEXT PRIMARY KEY,
    lineage_id TEXT NOT NULL,
    client_id TEXT NOT NULL,
    msa_id TEXT NOT NULL,
    title TEXT,
    engagement_type TEXT NOT NULL CHECK (engagement_type IN ('FixedPrice', 'Retainer')),
    status TEXT NOT NULL DEFAULT 'Draft',
    period_start TEXT,
    period_end TEXT,
    base_value TEXT,
    billing_day TEXT,
    currency TEXT,
    payment_terms TEXT,
    version INTEGER NOT NULL CHECK (version >= 1),
    parent_version_id TEXT,
    is_current INTEGER NOT NULL DEFAULT 0,
    superseded_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (lineage_id, version),
    FOREIGN KEY (msa_id) REFERENCES master_contracts(id),
    FOREIGN KEY (parent_version_id) REFERENCES sow_contracts(id)
);

-- One current row per lineage
CREATE UNIQUE INDEX IF NOT EXISTS idx_sow_current ON sow_contracts(lineage_id) WHERE is_current = 1;
CREATE INDEX IF NOT EXISTS idx_sow_msa ON sow_contracts(msa_id);
CREATE INDEX IF NOT EXISTS idx_sow_client ON sow_contracts(client_id);

CREATE TABLE IF NOT EXISTS sow_assignments (
    id TEXT PRIMARY KEY,
    sow_id TEXT NOT NULL,
    slot TEXT NOT NULL,
    engineer TEXT,
    role TEXT,
    level TEXT,
    rate TEXT,
    start_date TEXT,
    end_date TEXT,
    UNIQUE (sow_id, slot),
    FOREIGN KEY (sow_id) REFERENCES sow_contracts(id)
);

CREATE TABLE IF NOT EXISTS change_requests (
    id TEXT PRIMARY KEY,
    contract_kind TEXT NOT NULL CHECK (contract_kind IN ('MSA', 'SOW')),
    msa_id TEXT,
    sow_id TEXT,
    code TEXT NOT NULL UNIQUE,
    cr_type TEXT NOT NULL,
    title TEXT,
    summary TEXT,
    description TEXT,
    reason TEXT,
    status TEXT NOT NULL DEFAULT 'Draft'
        CHECK (status IN ('Draft', 'Under_Review', 'Request_for_Change', 'Active', 'Terminated')),
    review_stage TEXT,
    desired_start_date TEXT,
    desired_end_date TEXT,
    effective_from TEXT,
    expected_extra_cost TEXT,
    amount TEXT,
    dev_hours INTEGER,
    test_hours INTEGER,
    new_end_date TEXT,
    delay_duration INTEGER,
    cost_estimated TEXT,
    appendix_id TEXT,
    created_by TEXT NOT NULL,
    approved_by TEXT,
    approved_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK (
        (contract_kind = 'MSA' AND msa_id IS NOT NULL AND sow_id IS NULL)
        OR (contract_kind = 'SOW' AND sow_id IS NOT NULL AND msa_id IS NULL)
    ),
    FOREIGN KEY (msa_id) REFERENCES master_contracts(id),
    FOREIGN KEY (sow_id) REFERENCES sow_contracts(id)
);

CREATE INDEX IF NOT EXISTS idx_cr_sow ON change_requests(sow_id);
CREATE INDEX IF NOT EXISTS idx_cr_msa ON change_requests(msa_id);
CREATE INDEX IF NOT EXISTS idx_cr_created ON change_requests(created_at);

CREATE TABLE IF NOT EXISTS change_request_history (
    id TEXT PRIMARY KEY,
    change_request_id TEXT NOT NULL,
    action TEXT NOT NULL,
    actor_id TEXT NOT NULL,
    actor_name TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    FOREIGN KEY (change_request_id) REFERENCES change_requests(id)
);

CREATE INDEX IF NOT EXISTS idx_cr_history ON change_request_history(change_request_id);

CREATE TRIGGER IF NOT EXISTS trg_history_no_update
BEFORE UPDATE ON change_request_history
BEGIN
    SELECT RAISE(ABORT, 'change request history is append-only');
END;

CREATE TRIGGER IF NOT EXISTS trg_history_no_delete
BEFORE DELETE ON change_request_history
BEGIN
    SELECT RAISE(ABORT, 'change request history is append-only');
END;

CREATE TABLE IF NOT EXISTS cr_resource_events (
    id TEXT PRIMARY KEY,
    change_request_id TEXT NOT NULL,
    action TEXT NOT NULL CHECK (action IN ('ADD', 'REMOVE', 'MODIFY')),
    slot TEXT,
    engineer TEXT,
    role TEXT,
    level TEXT,
    rate_before TEXT,
    rate_after TEXT,
    start_before TEXT,
    start_after TEXT,
    end_before TEXT,
    end_after TEXT,
    effective_from TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (change_request_id) REFERENCES change_requests(id)
);

CREATE INDEX IF NOT EXISTS idx_resource_event_cr ON cr_resource_events(change_request_id);

CREATE TABLE IF NOT EXISTS cr_billing_events (
    id TEXT PRIMARY KEY,
    change_request_id TEXT NOT NULL,
    billing_month TEXT NOT NULL,
    delta_amount TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL,
    FOREIGN KEY (change_request_id) REFERENCES change_requests(id)
);

CREATE INDEX IF NOT EXISTS idx_billing_event_cr ON cr_billing_events(change_request_id);

CREATE TABLE IF NOT EXISTS billing_schedule (
    id TEXT PRIMARY KEY,
    sow_id TEXT NOT NULL,
    form TEXT NOT NULL CHECK (form IN ('milestone', 'retainer')),
    name TEXT,
    planned_date TEXT,
    billing_month TEXT,
    amount TEXT NOT NULL,
    invoice_date TEXT NOT NULL,
    paid INTEGER NOT NULL DEFAULT 0,
    change_request_id TEXT,
    created_at TEXT NOT NULL,
    FOREIGN KEY (sow_id) REFERENCES sow_contracts(id),
    FOREIGN KEY (change_request_id) REFERENCES change_requests(id)
);

CREATE INDEX IF NOT EXISTS idx_billing_sow ON billing_schedule(sow_id);

CREATE TABLE IF NOT EXISTS contract_appendices (
    id TEXT PRIMARY KEY,
    sow_id TEXT NOT NULL,
    lineage_id TEXT NOT NULL,
    change_request_id TEXT NOT NULL UNIQUE,
    sequence INTEGER NOT NULL CHECK (sequence >= 1),
    title TEXT NOT NULL,
    summary TEXT NOT NULL,
    signed_at TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (lineage_id, sequence),
    FOREIGN KEY (sow_id) REFERENCES sow_contracts(id),
    FOREIGN KEY (change_request_id) REFERENCES change_requests(id)
);
"#;

/// V2 migration: change request attachments stored in the blob store
pub const MIGRATION_V2: &str = r#"
CREATE TABLE IF NOT EXISTS cr_attachments (
    id TEXT PRIMARY KEY,
    change_request_id TEXT NOT NULL,
    file_name TEXT NOT NULL,
    blob_key TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    uploaded_at TEXT NOT NULL,
    FOREIGN KEY (change_request_id) REFERENCES change_requests(id)
);

CREATE INDEX IF NOT EXISTS idx_attachment_cr ON cr_attachments(change_request_id);
"#;
