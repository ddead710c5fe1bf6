//! Versioned PostgreSQL migrations.
//!
//! Each migration runs in its own transaction under a transaction-scoped
//! advisory lock and is recorded in `schema_migrations`, so concurrent
//! starters and repeated runs are both harmless.
//!
//! Cross-record rules are installed as triggers. They raise
//! `integrity_constraint_violation` with constraint name
//! [`CONSISTENCY_CONSTRAINT`] and a JSON `DETAIL` that decodes into
//! `strata_models::ConsistencyViolation`.

use anyhow::{Context, Result};
use sqlx::{Executor, PgPool};

pub const CONSISTENCY_CONSTRAINT: &str = "strata_consistency";

const MIGRATION_LOCK_KEY: i64 = 0x5354_5241_5441;

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "core catalogue tables",
        sql: CORE_TABLES,
    },
    Migration {
        version: 2,
        description: "site scope triggers",
        sql: SITE_SCOPE_TRIGGERS,
    },
    Migration {
        version: 3,
        description: "polymorphic subject triggers",
        sql: SUBJECT_TRIGGERS,
    },
    Migration {
        version: 4,
        description: "stratigraphic sequence triggers",
        sql: SEQUENCE_TRIGGERS,
    },
    Migration {
        version: 5,
        description: "ordered dependents and breadth-first cycle check",
        sql: ORDERED_DEPENDENTS_AND_SEQUENCE_SEARCH,
    },
];

pub async fn run_postgres_migrations(pool: &PgPool) -> Result<Vec<i64>> {
    tracing::info!("Running PostgreSQL migrations");

    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version BIGINT PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .await
    .context("Failed to create schema_migrations table")?;

    let mut applied = Vec::new();
    for migration in MIGRATIONS {
        if apply(pool, migration).await? {
            applied.push(migration.version);
        }
    }

    tracing::info!(applied = ?applied, "PostgreSQL migrations completed successfully");
    Ok(applied)
}

async fn apply(pool: &PgPool, migration: &Migration) -> Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *tx)
        .await?;

    let done: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM schema_migrations WHERE version = $1)",
    )
    .bind(migration.version)
    .fetch_one(&mut *tx)
    .await?;

    if done {
        tx.rollback().await?;
        return Ok(false);
    }

    tracing::info!(
        version = migration.version,
        description = migration.description,
        "applying migration"
    );

    (&mut *tx)
        .execute(migration.sql)
        .await
        .with_context(|| format!("Migration {} ({}) failed", migration.version, migration.description))?;

    sqlx::query("INSERT INTO schema_migrations (version, description) VALUES ($1, $2)")
        .bind(migration.version)
        .bind(migration.description)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}

pub async fn applied_versions(pool: &PgPool) -> Result<Vec<i64>> {
    let versions = sqlx::query_scalar("SELECT version FROM schema_migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .context("Failed to read schema_migrations")?;
    Ok(versions)
}

const CORE_TABLES: &str = r#"
CREATE TABLE sites (
    id UUID PRIMARY KEY,
    code VARCHAR(3) NOT NULL,
    name VARCHAR(255) NOT NULL,
    description TEXT,
    chronology_lower INTEGER,
    chronology_upper INTEGER,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT uq_sites_code UNIQUE (code),
    CONSTRAINT uq_sites_name UNIQUE (name),
    CONSTRAINT chk_sites_code CHECK (code ~ '^[A-Z]{2,3}$'),
    CONSTRAINT chk_sites_chronology CHECK (
        chronology_lower IS NULL OR chronology_upper IS NULL OR chronology_lower <= chronology_upper
    )
);

CREATE TABLE stratigraphic_units (
    id UUID PRIMARY KEY,
    site_id UUID NOT NULL,
    year INTEGER NOT NULL,
    number INTEGER NOT NULL,
    description TEXT,
    interpretation TEXT,
    chronology_lower INTEGER,
    chronology_upper INTEGER,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT fk_stratigraphic_units_site FOREIGN KEY (site_id) REFERENCES sites (id) ON DELETE RESTRICT,
    CONSTRAINT uq_stratigraphic_units_identity UNIQUE (site_id, year, number),
    CONSTRAINT chk_stratigraphic_units_year CHECK (year BETWEEN 1900 AND 2100),
    CONSTRAINT chk_stratigraphic_units_number CHECK (number > 0),
    CONSTRAINT chk_stratigraphic_units_chronology CHECK (
        chronology_lower IS NULL OR chronology_upper IS NULL OR chronology_lower <= chronology_upper
    )
);

CREATE TABLE stratigraphic_relationships (
    id UUID PRIMARY KEY,
    lft_su_id UUID NOT NULL,
    relation VARCHAR(16) NOT NULL,
    rgt_su_id UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT fk_stratigraphic_relationships_lft FOREIGN KEY (lft_su_id) REFERENCES stratigraphic_units (id) ON DELETE CASCADE,
    CONSTRAINT fk_stratigraphic_relationships_rgt FOREIGN KEY (rgt_su_id) REFERENCES stratigraphic_units (id) ON DELETE CASCADE,
    CONSTRAINT chk_stratigraphic_relationships_self CHECK (lft_su_id <> rgt_su_id),
    CONSTRAINT chk_stratigraphic_relationships_relation CHECK (relation IN (
        'covers', 'covered_by', 'cuts', 'cut_by', 'fills', 'filled_by',
        'abuts', 'abutted_by', 'equals', 'bonds_with'
    ))
);

CREATE UNIQUE INDEX uq_stratigraphic_relationships_pair
    ON stratigraphic_relationships (LEAST(lft_su_id, rgt_su_id), GREATEST(lft_su_id, rgt_su_id));

CREATE TABLE contexts (
    id UUID PRIMARY KEY,
    site_id UUID NOT NULL,
    context_type VARCHAR(16) NOT NULL,
    name VARCHAR(255) NOT NULL,
    description TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT fk_contexts_site FOREIGN KEY (site_id) REFERENCES sites (id) ON DELETE RESTRICT,
    CONSTRAINT uq_contexts_name UNIQUE (site_id, name),
    CONSTRAINT chk_contexts_type CHECK (context_type IN (
        'fill', 'layer', 'structure', 'cut', 'deposit', 'burial'
    ))
);

CREATE TABLE context_stratigraphic_units (
    id UUID PRIMARY KEY,
    context_id UUID NOT NULL,
    su_id UUID NOT NULL,
    CONSTRAINT fk_context_stratigraphic_units_context FOREIGN KEY (context_id) REFERENCES contexts (id) ON DELETE CASCADE,
    CONSTRAINT fk_context_stratigraphic_units_su FOREIGN KEY (su_id) REFERENCES stratigraphic_units (id) ON DELETE RESTRICT,
    CONSTRAINT uq_context_stratigraphic_units UNIQUE (context_id, su_id)
);

CREATE TABLE samples (
    id UUID PRIMARY KEY,
    site_id UUID NOT NULL,
    sample_type VARCHAR(16) NOT NULL,
    year INTEGER NOT NULL,
    number INTEGER NOT NULL,
    description TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT fk_samples_site FOREIGN KEY (site_id) REFERENCES sites (id) ON DELETE RESTRICT,
    CONSTRAINT uq_samples_identity UNIQUE (site_id, sample_type, year, number),
    CONSTRAINT chk_samples_year CHECK (year BETWEEN 1900 AND 2100),
    CONSTRAINT chk_samples_number CHECK (number > 0),
    CONSTRAINT chk_samples_type CHECK (sample_type IN (
        'sediment', 'charcoal', 'seeds', 'bone', 'mortar', 'other'
    ))
);

CREATE TABLE sample_stratigraphic_units (
    id UUID PRIMARY KEY,
    sample_id UUID NOT NULL,
    su_id UUID NOT NULL,
    CONSTRAINT fk_sample_stratigraphic_units_sample FOREIGN KEY (sample_id) REFERENCES samples (id) ON DELETE CASCADE,
    CONSTRAINT fk_sample_stratigraphic_units_su FOREIGN KEY (su_id) REFERENCES stratigraphic_units (id) ON DELETE RESTRICT,
    CONSTRAINT uq_sample_stratigraphic_units UNIQUE (sample_id, su_id)
);

CREATE TABLE potteries (
    id UUID PRIMARY KEY,
    su_id UUID NOT NULL,
    inventory VARCHAR(32) NOT NULL,
    culture_context VARCHAR(255),
    chronology VARCHAR(255),
    functional_group VARCHAR(255),
    form VARCHAR(255),
    surface_treatment VARCHAR(255),
    decoration VARCHAR(255),
    notes TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT fk_potteries_su FOREIGN KEY (su_id) REFERENCES stratigraphic_units (id) ON DELETE RESTRICT,
    CONSTRAINT chk_potteries_inventory CHECK (inventory ~ '^[A-Za-z0-9._/-]{1,32}$')
);

CREATE TABLE zoo_bones (
    id UUID PRIMARY KEY,
    su_id UUID NOT NULL,
    taxon VARCHAR(255) NOT NULL,
    element VARCHAR(255) NOT NULL,
    side VARCHAR(16),
    count INTEGER NOT NULL DEFAULT 1,
    notes TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT fk_zoo_bones_su FOREIGN KEY (su_id) REFERENCES stratigraphic_units (id) ON DELETE RESTRICT,
    CONSTRAINT chk_zoo_bones_count CHECK (count > 0),
    CONSTRAINT chk_zoo_bones_side CHECK (side IN ('left', 'right', 'axial', 'indeterminate'))
);

CREATE TABLE zoo_teeth (
    id UUID PRIMARY KEY,
    su_id UUID NOT NULL,
    taxon VARCHAR(255) NOT NULL,
    element VARCHAR(255) NOT NULL,
    side VARCHAR(16),
    wear_stage INTEGER,
    notes TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT fk_zoo_teeth_su FOREIGN KEY (su_id) REFERENCES stratigraphic_units (id) ON DELETE RESTRICT,
    CONSTRAINT chk_zoo_teeth_wear_stage CHECK (wear_stage BETWEEN 0 AND 10),
    CONSTRAINT chk_zoo_teeth_side CHECK (side IN ('left', 'right', 'axial', 'indeterminate'))
);

CREATE TABLE botany_charcoals (
    id UUID PRIMARY KEY,
    su_id UUID NOT NULL,
    taxon VARCHAR(255) NOT NULL,
    count INTEGER NOT NULL,
    notes TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT fk_botany_charcoals_su FOREIGN KEY (su_id) REFERENCES stratigraphic_units (id) ON DELETE RESTRICT,
    CONSTRAINT chk_botany_charcoals_count CHECK (count > 0)
);

CREATE TABLE botany_seeds (
    id UUID PRIMARY KEY,
    su_id UUID NOT NULL,
    taxon VARCHAR(255) NOT NULL,
    count INTEGER NOT NULL,
    notes TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT fk_botany_seeds_su FOREIGN KEY (su_id) REFERENCES stratigraphic_units (id) ON DELETE RESTRICT,
    CONSTRAINT chk_botany_seeds_count CHECK (count > 0)
);

CREATE TABLE analyses (
    id UUID PRIMARY KEY,
    analysis_type VARCHAR(32) NOT NULL,
    identifier VARCHAR(64) NOT NULL,
    year INTEGER NOT NULL,
    laboratory VARCHAR(255),
    responsible VARCHAR(255),
    status VARCHAR(16) NOT NULL DEFAULT 'planned',
    summary TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT uq_analyses_identity UNIQUE (analysis_type, identifier),
    CONSTRAINT chk_analyses_status CHECK (status IN ('planned', 'in_progress', 'completed', 'cancelled'))
);

CREATE TABLE analysis_subjects (
    id UUID PRIMARY KEY,
    analysis_id UUID NOT NULL,
    subject_kind VARCHAR(32) NOT NULL,
    subject_id UUID NOT NULL,
    summary TEXT,
    CONSTRAINT fk_analysis_subjects_analysis FOREIGN KEY (analysis_id) REFERENCES analyses (id) ON DELETE CASCADE,
    CONSTRAINT uq_analysis_subjects UNIQUE (analysis_id, subject_kind, subject_id)
);

CREATE TABLE media_objects (
    id UUID PRIMARY KEY,
    sha256 CHAR(64) NOT NULL,
    original_filename VARCHAR(255) NOT NULL,
    mime_type VARCHAR(255) NOT NULL,
    size_bytes BIGINT NOT NULL,
    description TEXT,
    uploaded_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT uq_media_objects_sha256 UNIQUE (sha256),
    CONSTRAINT chk_media_objects_size CHECK (size_bytes >= 0)
);

CREATE TABLE media_object_subjects (
    id UUID PRIMARY KEY,
    media_object_id UUID NOT NULL,
    subject_kind VARCHAR(32) NOT NULL,
    subject_id UUID NOT NULL,
    description TEXT,
    CONSTRAINT fk_media_object_subjects_media FOREIGN KEY (media_object_id) REFERENCES media_objects (id) ON DELETE CASCADE,
    CONSTRAINT uq_media_object_subjects UNIQUE (media_object_id, subject_kind, subject_id)
);

CREATE INDEX idx_stratigraphic_units_site_id ON stratigraphic_units (site_id);
CREATE INDEX idx_stratigraphic_relationships_rgt ON stratigraphic_relationships (rgt_su_id);
CREATE INDEX idx_stratigraphic_relationships_lft ON stratigraphic_relationships (lft_su_id);
CREATE INDEX idx_contexts_site_id ON contexts (site_id);
CREATE INDEX idx_context_stratigraphic_units_su ON context_stratigraphic_units (su_id);
CREATE INDEX idx_samples_site_id ON samples (site_id);
CREATE INDEX idx_sample_stratigraphic_units_su ON sample_stratigraphic_units (su_id);
CREATE INDEX idx_potteries_su_id ON potteries (su_id);
CREATE INDEX idx_potteries_inventory ON potteries (inventory);
CREATE INDEX idx_zoo_bones_su_id ON zoo_bones (su_id);
CREATE INDEX idx_zoo_teeth_su_id ON zoo_teeth (su_id);
CREATE INDEX idx_botany_charcoals_su_id ON botany_charcoals (su_id);
CREATE INDEX idx_botany_seeds_su_id ON botany_seeds (su_id);
CREATE INDEX idx_analysis_subjects_subject ON analysis_subjects (subject_kind, subject_id);
CREATE INDEX idx_media_object_subjects_subject ON media_object_subjects (subject_kind, subject_id);
"#;

const SITE_SCOPE_TRIGGERS: &str = r#"
CREATE OR REPLACE FUNCTION strata_raise(payload JSONB) RETURNS VOID AS $$
BEGIN
    RAISE EXCEPTION 'consistency violation: %', payload->>'code'
        USING ERRCODE = 'integrity_constraint_violation',
              CONSTRAINT = 'strata_consistency',
              DETAIL = payload::text;
END;
$$ LANGUAGE plpgsql;

CREATE OR REPLACE FUNCTION strata_record(kind TEXT, record_id UUID) RETURNS JSONB AS $$
    SELECT jsonb_build_object('kind', kind, 'id', record_id);
$$ LANGUAGE sql IMMUTABLE;

CREATE OR REPLACE FUNCTION strata_dependents(counts JSONB) RETURNS JSONB AS $$
    SELECT COALESCE(
        jsonb_agg(jsonb_build_object('relation', key, 'count', value::bigint) ORDER BY key),
        '[]'::jsonb
    )
    FROM jsonb_each_text(counts)
    WHERE value::bigint > 0;
$$ LANGUAGE sql IMMUTABLE;

CREATE OR REPLACE FUNCTION strata_require_same_site(
    left_kind TEXT, left_id UUID, left_site UUID,
    right_kind TEXT, right_id UUID, right_site UUID
) RETURNS VOID AS $$
BEGIN
    IF left_site IS NULL THEN
        PERFORM strata_raise(jsonb_build_object(
            'code', 'missing_reference', 'record', strata_record(left_kind, left_id)));
    END IF;
    IF right_site IS NULL THEN
        PERFORM strata_raise(jsonb_build_object(
            'code', 'missing_reference', 'record', strata_record(right_kind, right_id)));
    END IF;
    IF left_site <> right_site THEN
        PERFORM strata_raise(jsonb_build_object(
            'code', 'site_mismatch',
            'left', strata_record(left_kind, left_id),
            'left_site', left_site,
            'right', strata_record(right_kind, right_id),
            'right_site', right_site));
    END IF;
END;
$$ LANGUAGE plpgsql;

CREATE OR REPLACE FUNCTION strata_inverse_relation(relation TEXT) RETURNS TEXT AS $$
    SELECT CASE relation
        WHEN 'covers' THEN 'covered_by'
        WHEN 'covered_by' THEN 'covers'
        WHEN 'cuts' THEN 'cut_by'
        WHEN 'cut_by' THEN 'cuts'
        WHEN 'fills' THEN 'filled_by'
        WHEN 'filled_by' THEN 'fills'
        WHEN 'abuts' THEN 'abutted_by'
        WHEN 'abutted_by' THEN 'abuts'
        ELSE relation
    END;
$$ LANGUAGE sql IMMUTABLE;

-- Context <-> SU links stay inside one site.
CREATE OR REPLACE FUNCTION strata_check_context_su() RETURNS TRIGGER AS $$
BEGIN
    PERFORM strata_require_same_site(
        'context', NEW.context_id, (SELECT site_id FROM contexts WHERE id = NEW.context_id),
        'stratigraphic_unit', NEW.su_id, (SELECT site_id FROM stratigraphic_units WHERE id = NEW.su_id));
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_context_stratigraphic_units_scope
    BEFORE INSERT OR UPDATE ON context_stratigraphic_units
    FOR EACH ROW EXECUTE FUNCTION strata_check_context_su();

-- Sample <-> SU links stay inside one site.
CREATE OR REPLACE FUNCTION strata_check_sample_su() RETURNS TRIGGER AS $$
BEGIN
    PERFORM strata_require_same_site(
        'sample', NEW.sample_id, (SELECT site_id FROM samples WHERE id = NEW.sample_id),
        'stratigraphic_unit', NEW.su_id, (SELECT site_id FROM stratigraphic_units WHERE id = NEW.su_id));
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_sample_stratigraphic_units_scope
    BEFORE INSERT OR UPDATE ON sample_stratigraphic_units
    FOR EACH ROW EXECUTE FUNCTION strata_check_sample_su();

-- SU relationships: same site, one relationship per pair.
CREATE OR REPLACE FUNCTION strata_check_su_relationship() RETURNS TRIGGER AS $$
DECLARE
    existing RECORD;
BEGIN
    IF NEW.lft_su_id = NEW.rgt_su_id THEN
        PERFORM strata_raise(jsonb_build_object('code', 'self_relationship', 'su_id', NEW.lft_su_id));
    END IF;

    PERFORM strata_require_same_site(
        'stratigraphic_unit', NEW.lft_su_id, (SELECT site_id FROM stratigraphic_units WHERE id = NEW.lft_su_id),
        'stratigraphic_unit', NEW.rgt_su_id, (SELECT site_id FROM stratigraphic_units WHERE id = NEW.rgt_su_id));

    SELECT lft_su_id, relation INTO existing
    FROM stratigraphic_relationships
    WHERE id <> NEW.id
      AND ((lft_su_id = NEW.lft_su_id AND rgt_su_id = NEW.rgt_su_id)
        OR (lft_su_id = NEW.rgt_su_id AND rgt_su_id = NEW.lft_su_id))
    LIMIT 1;

    IF FOUND THEN
        PERFORM strata_raise(jsonb_build_object(
            'code', 'duplicate_relationship',
            'lft_su_id', NEW.lft_su_id,
            'rgt_su_id', NEW.rgt_su_id,
            'existing', CASE WHEN existing.lft_su_id = NEW.lft_su_id
                             THEN existing.relation
                             ELSE strata_inverse_relation(existing.relation) END));
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_stratigraphic_relationships_scope
    BEFORE INSERT OR UPDATE ON stratigraphic_relationships
    FOR EACH ROW EXECUTE FUNCTION strata_check_su_relationship();

-- Pottery inventories are unique within the site of their SU.
CREATE OR REPLACE FUNCTION strata_check_pottery_inventory() RETURNS TRIGGER AS $$
DECLARE
    pottery_site UUID;
BEGIN
    SELECT site_id INTO pottery_site FROM stratigraphic_units WHERE id = NEW.su_id;
    IF pottery_site IS NULL THEN
        PERFORM strata_raise(jsonb_build_object(
            'code', 'missing_reference', 'record', strata_record('stratigraphic_unit', NEW.su_id)));
    END IF;

    IF EXISTS (
        SELECT 1
        FROM potteries p
        JOIN stratigraphic_units su ON su.id = p.su_id
        WHERE su.site_id = pottery_site
          AND p.inventory = NEW.inventory
          AND p.id <> NEW.id
    ) THEN
        PERFORM strata_raise(jsonb_build_object(
            'code', 'duplicate_identity',
            'record', 'pottery',
            'identity', format('site_id=%s inventory=%s', pottery_site, NEW.inventory)));
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_potteries_inventory
    BEFORE INSERT OR UPDATE OF su_id, inventory ON potteries
    FOR EACH ROW EXECUTE FUNCTION strata_check_pottery_inventory();

-- A record can not move to another site while other records depend on its site.
CREATE OR REPLACE FUNCTION strata_check_su_site_change() RETURNS TRIGGER AS $$
DECLARE
    dependents JSONB;
BEGIN
    IF NEW.site_id = OLD.site_id THEN
        RETURN NEW;
    END IF;

    dependents := strata_dependents(jsonb_build_object(
        'context_stratigraphic_units', (SELECT COUNT(*) FROM context_stratigraphic_units WHERE su_id = OLD.id),
        'sample_stratigraphic_units', (SELECT COUNT(*) FROM sample_stratigraphic_units WHERE su_id = OLD.id),
        'stratigraphic_relationships', (SELECT COUNT(*) FROM stratigraphic_relationships
                                        WHERE lft_su_id = OLD.id OR rgt_su_id = OLD.id),
        'potteries', (SELECT COUNT(*) FROM potteries WHERE su_id = OLD.id),
        'zoo_bones', (SELECT COUNT(*) FROM zoo_bones WHERE su_id = OLD.id),
        'zoo_teeth', (SELECT COUNT(*) FROM zoo_teeth WHERE su_id = OLD.id),
        'botany_charcoals', (SELECT COUNT(*) FROM botany_charcoals WHERE su_id = OLD.id),
        'botany_seeds', (SELECT COUNT(*) FROM botany_seeds WHERE su_id = OLD.id)));

    IF jsonb_array_length(dependents) > 0 THEN
        PERFORM strata_raise(jsonb_build_object(
            'code', 'site_reassignment',
            'record', strata_record('stratigraphic_unit', OLD.id),
            'dependents', dependents));
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_stratigraphic_units_site_change
    BEFORE UPDATE OF site_id ON stratigraphic_units
    FOR EACH ROW EXECUTE FUNCTION strata_check_su_site_change();

CREATE OR REPLACE FUNCTION strata_check_context_site_change() RETURNS TRIGGER AS $$
DECLARE
    dependents JSONB;
BEGIN
    IF NEW.site_id = OLD.site_id THEN
        RETURN NEW;
    END IF;

    dependents := strata_dependents(jsonb_build_object(
        'context_stratigraphic_units', (SELECT COUNT(*) FROM context_stratigraphic_units WHERE context_id = OLD.id)));

    IF jsonb_array_length(dependents) > 0 THEN
        PERFORM strata_raise(jsonb_build_object(
            'code', 'site_reassignment',
            'record', strata_record('context', OLD.id),
            'dependents', dependents));
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_contexts_site_change
    BEFORE UPDATE OF site_id ON contexts
    FOR EACH ROW EXECUTE FUNCTION strata_check_context_site_change();

CREATE OR REPLACE FUNCTION strata_check_sample_site_change() RETURNS TRIGGER AS $$
DECLARE
    dependents JSONB;
BEGIN
    IF NEW.site_id = OLD.site_id THEN
        RETURN NEW;
    END IF;

    dependents := strata_dependents(jsonb_build_object(
        'sample_stratigraphic_units', (SELECT COUNT(*) FROM sample_stratigraphic_units WHERE sample_id = OLD.id)));

    IF jsonb_array_length(dependents) > 0 THEN
        PERFORM strata_raise(jsonb_build_object(
            'code', 'site_reassignment',
            'record', strata_record('sample', OLD.id),
            'dependents', dependents));
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_samples_site_change
    BEFORE UPDATE OF site_id ON samples
    FOR EACH ROW EXECUTE FUNCTION strata_check_sample_site_change();
"#;

const SUBJECT_TRIGGERS: &str = r#"
CREATE OR REPLACE FUNCTION strata_subject_table(kind TEXT) RETURNS TEXT AS $$
    SELECT CASE kind
        WHEN 'site' THEN 'sites'
        WHEN 'stratigraphic_unit' THEN 'stratigraphic_units'
        WHEN 'context' THEN 'contexts'
        WHEN 'sample' THEN 'samples'
        WHEN 'pottery' THEN 'potteries'
        WHEN 'zoo_bone' THEN 'zoo_bones'
        WHEN 'zoo_tooth' THEN 'zoo_teeth'
        WHEN 'botany_charcoal' THEN 'botany_charcoals'
        WHEN 'botany_seed' THEN 'botany_seeds'
    END;
$$ LANGUAGE sql IMMUTABLE;

CREATE OR REPLACE FUNCTION strata_subject_exists(kind TEXT, subject UUID) RETURNS BOOLEAN AS $$
DECLARE
    subject_table TEXT := strata_subject_table(kind);
    present BOOLEAN;
BEGIN
    IF subject_table IS NULL THEN
        RETURN FALSE;
    END IF;
    EXECUTE format('SELECT EXISTS (SELECT 1 FROM %I WHERE id = $1)', subject_table)
        INTO present
        USING subject;
    RETURN present;
END;
$$ LANGUAGE plpgsql STABLE;

ALTER TABLE analysis_subjects ADD CONSTRAINT chk_analysis_subjects_kind
    CHECK (strata_subject_table(subject_kind) IS NOT NULL);
ALTER TABLE media_object_subjects ADD CONSTRAINT chk_media_object_subjects_kind
    CHECK (strata_subject_table(subject_kind) IS NOT NULL);

CREATE TABLE analysis_type_subject_kinds (
    analysis_type VARCHAR(32) NOT NULL,
    subject_kind VARCHAR(32) NOT NULL,
    PRIMARY KEY (analysis_type, subject_kind)
);

INSERT INTO analysis_type_subject_kinds (analysis_type, subject_kind) VALUES
    ('radiocarbon', 'sample'),
    ('radiocarbon', 'zoo_bone'),
    ('radiocarbon', 'zoo_tooth'),
    ('radiocarbon', 'botany_charcoal'),
    ('radiocarbon', 'botany_seed'),
    ('ancient_dna', 'zoo_bone'),
    ('ancient_dna', 'zoo_tooth'),
    ('stable_isotopes', 'zoo_bone'),
    ('stable_isotopes', 'zoo_tooth'),
    ('stable_isotopes', 'botany_seed'),
    ('petrography', 'pottery'),
    ('petrography', 'sample'),
    ('residue', 'pottery'),
    ('anthracology', 'botany_charcoal'),
    ('anthracology', 'sample'),
    ('carpology', 'botany_seed'),
    ('carpology', 'sample'),
    ('zooarchaeology', 'zoo_bone'),
    ('zooarchaeology', 'zoo_tooth'),
    ('zooarchaeology', 'stratigraphic_unit'),
    ('micromorphology', 'sample'),
    ('micromorphology', 'stratigraphic_unit'),
    ('micromorphology', 'context');

ALTER TABLE analyses ADD CONSTRAINT chk_analyses_type CHECK (analysis_type IN (
    'radiocarbon', 'ancient_dna', 'stable_isotopes', 'petrography', 'residue',
    'anthracology', 'carpology', 'zooarchaeology', 'micromorphology'
));

CREATE OR REPLACE FUNCTION strata_check_analysis_subject() RETURNS TRIGGER AS $$
DECLARE
    subject_analysis_type TEXT;
BEGIN
    SELECT analysis_type INTO subject_analysis_type FROM analyses WHERE id = NEW.analysis_id;
    IF NOT FOUND THEN
        PERFORM strata_raise(jsonb_build_object(
            'code', 'missing_reference', 'record', strata_record('analysis', NEW.analysis_id)));
    END IF;

    IF NOT strata_subject_exists(NEW.subject_kind, NEW.subject_id) THEN
        PERFORM strata_raise(jsonb_build_object(
            'code', 'missing_reference', 'record', strata_record(NEW.subject_kind, NEW.subject_id)));
    END IF;

    IF NOT EXISTS (
        SELECT 1 FROM analysis_type_subject_kinds
        WHERE analysis_type = subject_analysis_type AND subject_kind = NEW.subject_kind
    ) THEN
        PERFORM strata_raise(jsonb_build_object(
            'code', 'subject_not_admitted',
            'analysis_type', subject_analysis_type,
            'subject_kind', NEW.subject_kind));
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_analysis_subjects_subject
    BEFORE INSERT OR UPDATE ON analysis_subjects
    FOR EACH ROW EXECUTE FUNCTION strata_check_analysis_subject();

-- Changing the type of an analysis must keep its existing subjects admissible.
CREATE OR REPLACE FUNCTION strata_check_analysis_type_change() RETURNS TRIGGER AS $$
DECLARE
    offending TEXT;
BEGIN
    IF NEW.analysis_type = OLD.analysis_type THEN
        RETURN NEW;
    END IF;

    SELECT s.subject_kind INTO offending
    FROM analysis_subjects s
    WHERE s.analysis_id = NEW.id
      AND NOT EXISTS (
          SELECT 1 FROM analysis_type_subject_kinds m
          WHERE m.analysis_type = NEW.analysis_type AND m.subject_kind = s.subject_kind)
    ORDER BY s.subject_kind
    LIMIT 1;

    IF FOUND THEN
        PERFORM strata_raise(jsonb_build_object(
            'code', 'subject_not_admitted',
            'analysis_type', NEW.analysis_type,
            'subject_kind', offending));
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_analyses_type_change
    BEFORE UPDATE OF analysis_type ON analyses
    FOR EACH ROW EXECUTE FUNCTION strata_check_analysis_type_change();

CREATE OR REPLACE FUNCTION strata_check_media_subject() RETURNS TRIGGER AS $$
BEGIN
    IF NOT EXISTS (SELECT 1 FROM media_objects WHERE id = NEW.media_object_id) THEN
        PERFORM strata_raise(jsonb_build_object(
            'code', 'missing_reference', 'record', strata_record('media_object', NEW.media_object_id)));
    END IF;

    IF NOT strata_subject_exists(NEW.subject_kind, NEW.subject_id) THEN
        PERFORM strata_raise(jsonb_build_object(
            'code', 'missing_reference', 'record', strata_record(NEW.subject_kind, NEW.subject_id)));
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_media_object_subjects_subject
    BEFORE INSERT OR UPDATE ON media_object_subjects
    FOR EACH ROW EXECUTE FUNCTION strata_check_media_subject();

-- Subjects referenced by analyses or media can not be deleted.
-- TG_ARGV[0] is the subject kind of the table the trigger is attached to.
CREATE OR REPLACE FUNCTION strata_block_subject_deletion() RETURNS TRIGGER AS $$
DECLARE
    dependents JSONB;
BEGIN
    dependents := strata_dependents(jsonb_build_object(
        'analysis_subjects', (SELECT COUNT(*) FROM analysis_subjects
                              WHERE subject_kind = TG_ARGV[0] AND subject_id = OLD.id),
        'media_object_subjects', (SELECT COUNT(*) FROM media_object_subjects
                                  WHERE subject_kind = TG_ARGV[0] AND subject_id = OLD.id)));

    IF jsonb_array_length(dependents) > 0 THEN
        PERFORM strata_raise(jsonb_build_object(
            'code', 'deletion_blocked',
            'record', strata_record(TG_ARGV[0], OLD.id),
            'dependents', dependents));
    END IF;
    RETURN OLD;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_sites_subject_deletion BEFORE DELETE ON sites
    FOR EACH ROW EXECUTE FUNCTION strata_block_subject_deletion('site');
CREATE TRIGGER trg_stratigraphic_units_subject_deletion BEFORE DELETE ON stratigraphic_units
    FOR EACH ROW EXECUTE FUNCTION strata_block_subject_deletion('stratigraphic_unit');
CREATE TRIGGER trg_contexts_subject_deletion BEFORE DELETE ON contexts
    FOR EACH ROW EXECUTE FUNCTION strata_block_subject_deletion('context');
CREATE TRIGGER trg_samples_subject_deletion BEFORE DELETE ON samples
    FOR EACH ROW EXECUTE FUNCTION strata_block_subject_deletion('sample');
CREATE TRIGGER trg_potteries_subject_deletion BEFORE DELETE ON potteries
    FOR EACH ROW EXECUTE FUNCTION strata_block_subject_deletion('pottery');
CREATE TRIGGER trg_zoo_bones_subject_deletion BEFORE DELETE ON zoo_bones
    FOR EACH ROW EXECUTE FUNCTION strata_block_subject_deletion('zoo_bone');
CREATE TRIGGER trg_zoo_teeth_subject_deletion BEFORE DELETE ON zoo_teeth
    FOR EACH ROW EXECUTE FUNCTION strata_block_subject_deletion('zoo_tooth');
CREATE TRIGGER trg_botany_charcoals_subject_deletion BEFORE DELETE ON botany_charcoals
    FOR EACH ROW EXECUTE FUNCTION strata_block_subject_deletion('botany_charcoal');
CREATE TRIGGER trg_botany_seeds_subject_deletion BEFORE DELETE ON botany_seeds
    FOR EACH ROW EXECUTE FUNCTION strata_block_subject_deletion('botany_seed');
"#;

const SEQUENCE_TRIGGERS: &str = r#"
CREATE OR REPLACE FUNCTION strata_relation_precedence(relation TEXT) RETURNS SMALLINT AS $$
    SELECT CASE
        WHEN relation IN ('covers', 'cuts', 'fills') THEN 1::smallint
        WHEN relation IN ('covered_by', 'cut_by', 'filled_by') THEN -1::smallint
        ELSE 0::smallint
    END;
$$ LANGUAGE sql IMMUTABLE;

-- One row per relationship that orders its units in time.
CREATE VIEW stratigraphic_precedence AS
SELECT
    r.id AS relationship_id,
    CASE WHEN strata_relation_precedence(r.relation) = 1 THEN r.lft_su_id ELSE r.rgt_su_id END AS later_su_id,
    CASE WHEN strata_relation_precedence(r.relation) = 1 THEN r.rgt_su_id ELSE r.lft_su_id END AS earlier_su_id
FROM stratigraphic_relationships r
WHERE strata_relation_precedence(r.relation) <> 0;

-- A new "later than" edge must not make a unit later than itself.
CREATE OR REPLACE FUNCTION strata_check_stratigraphic_cycle() RETURNS TRIGGER AS $$
DECLARE
    direction SMALLINT := strata_relation_precedence(NEW.relation);
    later UUID;
    earlier UUID;
    cycle_path UUID[];
BEGIN
    IF direction = 0 THEN
        RETURN NEW;
    END IF;

    IF direction = 1 THEN
        later := NEW.lft_su_id;
        earlier := NEW.rgt_su_id;
    ELSE
        later := NEW.rgt_su_id;
        earlier := NEW.lft_su_id;
    END IF;

    WITH RECURSIVE reach (su_id, path) AS (
        SELECT earlier, ARRAY[earlier]
        UNION ALL
        SELECT p.earlier_su_id, r.path || p.earlier_su_id
        FROM reach r
        JOIN stratigraphic_precedence p ON p.later_su_id = r.su_id
        WHERE p.relationship_id <> NEW.id
          AND NOT p.earlier_su_id = ANY (r.path)
    )
    SELECT path INTO cycle_path FROM reach WHERE su_id = later LIMIT 1;

    IF cycle_path IS NOT NULL THEN
        PERFORM strata_raise(jsonb_build_object(
            'code', 'stratigraphic_cycle',
            'lft_su_id', NEW.lft_su_id,
            'rgt_su_id', NEW.rgt_su_id,
            'path', to_jsonb(ARRAY[later] || cycle_path)));
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_stratigraphic_relationships_sequence
    BEFORE INSERT OR UPDATE ON stratigraphic_relationships
    FOR EACH ROW EXECUTE FUNCTION strata_check_stratigraphic_cycle();
"#;

// Dependents are listed in the order the scope lookups count them, so both
// layers report the same violation. The cycle check visits each unit once.
const ORDERED_DEPENDENTS_AND_SEQUENCE_SEARCH: &str = r#"
CREATE OR REPLACE FUNCTION strata_dependents(relations TEXT[], counts BIGINT[]) RETURNS JSONB AS $$
    SELECT COALESCE(
        jsonb_agg(jsonb_build_object('relation', d.relation, 'count', d.count) ORDER BY d.ord),
        '[]'::jsonb
    )
    FROM unnest(relations, counts) WITH ORDINALITY AS d(relation, count, ord)
    WHERE d.count > 0;
$$ LANGUAGE sql IMMUTABLE;

CREATE OR REPLACE FUNCTION strata_check_su_site_change() RETURNS TRIGGER AS $$
DECLARE
    dependents JSONB;
BEGIN
    IF NEW.site_id = OLD.site_id THEN
        RETURN NEW;
    END IF;

    dependents := strata_dependents(
        ARRAY['context_stratigraphic_units', 'sample_stratigraphic_units', 'stratigraphic_relationships', 'potteries', 'zoo_bones', 'zoo_teeth', 'botany_charcoals', 'botany_seeds'],
        ARRAY[
            (SELECT COUNT(*) FROM context_stratigraphic_units WHERE su_id = OLD.id),
            (SELECT COUNT(*) FROM sample_stratigraphic_units WHERE su_id = OLD.id),
            (SELECT COUNT(*) FROM stratigraphic_relationships WHERE lft_su_id = OLD.id OR rgt_su_id = OLD.id),
            (SELECT COUNT(*) FROM potteries WHERE su_id = OLD.id),
            (SELECT COUNT(*) FROM zoo_bones WHERE su_id = OLD.id),
            (SELECT COUNT(*) FROM zoo_teeth WHERE su_id = OLD.id),
            (SELECT COUNT(*) FROM botany_charcoals WHERE su_id = OLD.id),
            (SELECT COUNT(*) FROM botany_seeds WHERE su_id = OLD.id)
        ]);

    IF jsonb_array_length(dependents) > 0 THEN
        PERFORM strata_raise(jsonb_build_object(
            'code', 'site_reassignment',
            'record', strata_record('stratigraphic_unit', OLD.id),
            'dependents', dependents));
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE OR REPLACE FUNCTION strata_check_context_site_change() RETURNS TRIGGER AS $$
DECLARE
    dependents JSONB;
BEGIN
    IF NEW.site_id = OLD.site_id THEN
        RETURN NEW;
    END IF;

    dependents := strata_dependents(
        ARRAY['context_stratigraphic_units'],
        ARRAY[(SELECT COUNT(*) FROM context_stratigraphic_units WHERE context_id = OLD.id)]);

    IF jsonb_array_length(dependents) > 0 THEN
        PERFORM strata_raise(jsonb_build_object(
            'code', 'site_reassignment',
            'record', strata_record('context', OLD.id),
            'dependents', dependents));
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE OR REPLACE FUNCTION strata_check_sample_site_change() RETURNS TRIGGER AS $$
DECLARE
    dependents JSONB;
BEGIN
    IF NEW.site_id = OLD.site_id THEN
        RETURN NEW;
    END IF;

    dependents := strata_dependents(
        ARRAY['sample_stratigraphic_units'],
        ARRAY[(SELECT COUNT(*) FROM sample_stratigraphic_units WHERE sample_id = OLD.id)]);

    IF jsonb_array_length(dependents) > 0 THEN
        PERFORM strata_raise(jsonb_build_object(
            'code', 'site_reassignment',
            'record', strata_record('sample', OLD.id),
            'dependents', dependents));
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

-- Owned rows first, then analysis and media links.
CREATE OR REPLACE FUNCTION strata_block_subject_deletion() RETURNS TRIGGER AS $$
DECLARE
    kind TEXT := TG_ARGV[0];
    relations TEXT[] := ARRAY[]::TEXT[];
    counts BIGINT[] := ARRAY[]::BIGINT[];
    dependents JSONB;
BEGIN
    IF kind = 'site' THEN
        relations := ARRAY['stratigraphic_units', 'contexts', 'samples'];
        counts := ARRAY[
            (SELECT COUNT(*) FROM stratigraphic_units WHERE site_id = OLD.id),
            (SELECT COUNT(*) FROM contexts WHERE site_id = OLD.id),
            (SELECT COUNT(*) FROM samples WHERE site_id = OLD.id)
        ];
    ELSIF kind = 'stratigraphic_unit' THEN
        relations := ARRAY['context_stratigraphic_units', 'sample_stratigraphic_units', 'potteries', 'zoo_bones', 'zoo_teeth', 'botany_charcoals', 'botany_seeds'];
        counts := ARRAY[
            (SELECT COUNT(*) FROM context_stratigraphic_units WHERE su_id = OLD.id),
            (SELECT COUNT(*) FROM sample_stratigraphic_units WHERE su_id = OLD.id),
            (SELECT COUNT(*) FROM potteries WHERE su_id = OLD.id),
            (SELECT COUNT(*) FROM zoo_bones WHERE su_id = OLD.id),
            (SELECT COUNT(*) FROM zoo_teeth WHERE su_id = OLD.id),
            (SELECT COUNT(*) FROM botany_charcoals WHERE su_id = OLD.id),
            (SELECT COUNT(*) FROM botany_seeds WHERE su_id = OLD.id)
        ];
    END IF;

    relations := relations || ARRAY['analysis_subjects', 'media_object_subjects'];
    counts := counts || ARRAY[
        (SELECT COUNT(*) FROM analysis_subjects WHERE subject_kind = kind AND subject_id = OLD.id),
        (SELECT COUNT(*) FROM media_object_subjects WHERE subject_kind = kind AND subject_id = OLD.id)
    ];

    dependents := strata_dependents(relations, counts);
    IF jsonb_array_length(dependents) > 0 THEN
        PERFORM strata_raise(jsonb_build_object(
            'code', 'deletion_blocked',
            'record', strata_record(kind, OLD.id),
            'dependents', dependents));
    END IF;
    RETURN OLD;
END;
$$ LANGUAGE plpgsql;

DROP FUNCTION strata_dependents(JSONB);

-- Breadth-first search from the earlier unit, successors in ascending id
-- order. Reports the shortest chain back to the later unit.
CREATE OR REPLACE FUNCTION strata_check_stratigraphic_cycle() RETURNS TRIGGER AS $$
DECLARE
    direction SMALLINT := strata_relation_precedence(NEW.relation);
    later UUID;
    earlier UUID;
    parents JSONB;
    queue UUID[];
    head INTEGER := 1;
    node UUID;
    next_su UUID;
    cursor_su UUID;
    cycle_path UUID[];
BEGIN
    IF direction = 0 THEN
        RETURN NEW;
    END IF;

    IF direction = 1 THEN
        later := NEW.lft_su_id;
        earlier := NEW.rgt_su_id;
    ELSE
        later := NEW.rgt_su_id;
        earlier := NEW.lft_su_id;
    END IF;

    parents := jsonb_build_object(earlier::text, NULL);
    queue := ARRAY[earlier];

    WHILE head <= array_length(queue, 1) AND cycle_path IS NULL LOOP
        node := queue[head];
        head := head + 1;

        FOR next_su IN
            SELECT e.su_id FROM (
                SELECT rgt_su_id AS su_id FROM stratigraphic_relationships
                WHERE lft_su_id = node AND id <> NEW.id AND strata_relation_precedence(relation) = 1
                UNION
                SELECT lft_su_id FROM stratigraphic_relationships
                WHERE rgt_su_id = node AND id <> NEW.id AND strata_relation_precedence(relation) = -1
            ) e
            ORDER BY e.su_id
        LOOP
            CONTINUE WHEN parents ? next_su::text;
            parents := parents || jsonb_build_object(next_su::text, node::text);

            IF next_su = later THEN
                cycle_path := ARRAY[later];
                cursor_su := later;
                WHILE cursor_su <> earlier LOOP
                    cursor_su := (parents->>cursor_su::text)::uuid;
                    cycle_path := cursor_su || cycle_path;
                END LOOP;
                EXIT;
            END IF;

            queue := queue || next_su;
        END LOOP;
    END LOOP;

    IF cycle_path IS NOT NULL THEN
        PERFORM strata_raise(jsonb_build_object(
            'code', 'stratigraphic_cycle',
            'lft_su_id', NEW.lft_su_id,
            'rgt_su_id', NEW.rgt_su_id,
            'path', to_jsonb(ARRAY[later] || cycle_path)));
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_are_strictly_increasing() {
        for pair in MIGRATIONS.windows(2) {
            assert!(pair[0].version < pair[1].version);
        }
    }

    #[test]
    fn test_triggers_use_shared_constraint_name() {
        assert!(SITE_SCOPE_TRIGGERS.contains(&format!("CONSTRAINT = '{}'", CONSISTENCY_CONSTRAINT)));
    }

    #[test]
    fn test_every_subject_table_blocks_deletion() {
        for kind in strata_models::SubjectKind::ALL {
            let trigger = format!(
                "ON {}\n    FOR EACH ROW EXECUTE FUNCTION strata_block_subject_deletion('{}')",
                kind.table_name(),
                kind.as_str()
            );
            assert!(SUBJECT_TRIGGERS.contains(&trigger), "missing deletion trigger for {}", kind);
        }
    }

    fn relation_array(relations: &[&str]) -> String {
        let quoted: Vec<String> = relations.iter().map(|r| format!("'{}'", r)).collect();
        format!("ARRAY[{}]", quoted.join(", "))
    }

    #[test]
    fn test_trigger_dependents_follow_lookup_order() {
        use crate::scope::{deletion_queries, site_bound_queries};
        use strata_models::RecordKind;

        let sql = ORDERED_DEPENDENTS_AND_SEQUENCE_SEARCH;
        for kind in [RecordKind::StratigraphicUnit, RecordKind::Context, RecordKind::Sample] {
            let relations: Vec<&str> = site_bound_queries(kind).iter().map(|q| q.relation).collect();
            assert!(sql.contains(&relation_array(&relations)), "site change order for {}", kind);
        }
        for kind in [RecordKind::Site, RecordKind::StratigraphicUnit] {
            let relations: Vec<&str> = deletion_queries(kind).iter().map(|q| q.relation).collect();
            assert!(sql.contains(&relation_array(&relations)), "deletion order for {}", kind);
        }
        assert!(sql.contains("relations || ARRAY['analysis_subjects', 'media_object_subjects']"));
    }

    #[test]
    fn test_cycle_search_does_not_enumerate_paths() {
        assert!(!ORDERED_DEPENDENTS_AND_SEQUENCE_SEARCH.contains("UNION ALL"));
        assert!(ORDERED_DEPENDENTS_AND_SEQUENCE_SEARCH.contains("CONTINUE WHEN parents ? next_su::text"));
        assert_eq!(MIGRATIONS.last().map(|m| m.sql), Some(ORDERED_DEPENDENTS_AND_SEQUENCE_SEARCH));
    }

    #[test]
    fn test_admission_matrix_matches_models() {
        for analysis_type in strata_models::AnalysisType::ALL {
            for kind in analysis_type.admitted_subjects() {
                let row = format!("('{}', '{}')", analysis_type.as_str(), kind.as_str());
                assert!(SUBJECT_TRIGGERS.contains(&row), "missing matrix row {}", row);
            }
        }
    }
}
