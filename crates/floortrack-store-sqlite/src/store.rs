//! [`SqliteStore`] — the SQLite implementation of [`PracticeStore`].

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use floortrack_core::{
  audit::{AuditEvent, NewAuditEvent},
  client::{
    Client, ClientStatus, GoalAssignment, GoalAssignmentList, GoalStatus,
    NewClient, NewGoalAssignment,
  },
  goal::{GoalDefinition, NewGoalDefinition},
  lifecycle::StatusChange,
  org::{NewOrganization, NewProvider, Organization, Provider},
  session::{DataCollection, NewDataCollection, NewSessionRecord, SessionRecord},
  store::PracticeStore,
  trial::TrialRecord,
};

use crate::{
  Error, Result,
  encode::{
    RawAssignment, RawAuditEvent, RawClient, RawCollection, RawGoal,
    RawOrganization, RawProvider, RawSession, RawTrial, encode_client_status,
    encode_date, encode_dt, encode_goal_status, encode_session_type,
    encode_string_list, encode_support, encode_support_level, encode_uuid,
    encode_uuid_list,
  },
  schema::SCHEMA,
};

// ─── Closure outcomes ────────────────────────────────────────────────────────

// Domain failures detected inside a `conn.call` closure. The closure can
// only raise rusqlite errors, so these travel back as values and are
// converted to [`Error`] variants on the async side.

enum AssignFailure {
  NoClient,
  NoGoal,
  Duplicate,
}

enum ChangeFailure {
  NoClient,
  NoAssignment,
  Conflict { found: i64 },
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Floortrack practice store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch the trial rows belonging to one collection, insertion order.
  fn collection_trials(
    conn: &rusqlite::Connection,
    collection_id: &str,
  ) -> rusqlite::Result<Vec<RawTrial>> {
    let mut stmt = conn.prepare(
      "SELECT goal_id, support_json, total, counter, recorded_at
       FROM trials WHERE collection_id = ?1
       ORDER BY trial_id",
    )?;
    stmt
      .query_map(rusqlite::params![collection_id], |row| {
        Ok(RawTrial {
          goal_id:      row.get(0)?,
          support_json: row.get(1)?,
          total:        row.get(2)?,
          counter:      row.get(3)?,
          recorded_at:  row.get(4)?,
        })
      })?
      .collect()
  }
}

// ─── PracticeStore impl ──────────────────────────────────────────────────────

impl PracticeStore for SqliteStore {
  type Error = Error;

  // ── Organizations & providers ─────────────────────────────────────────────

  async fn add_organization(
    &self,
    input: NewOrganization,
  ) -> Result<Organization> {
    let org = Organization {
      organization_id: Uuid::new_v4(),
      name:            input.name,
      email:           input.email,
      created_at:      Utc::now(),
    };

    let id_str = encode_uuid(org.organization_id);
    let name   = org.name.clone();
    let email  = org.email.clone();
    let at_str = encode_dt(org.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO organizations (organization_id, name, email, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, name, email, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(org)
  }

  async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawOrganization> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT organization_id, name, email, created_at
             FROM organizations WHERE organization_id = ?1",
            rusqlite::params![id_str],
            |row| {
              Ok(RawOrganization {
                organization_id: row.get(0)?,
                name:            row.get(1)?,
                email:           row.get(2)?,
                created_at:      row.get(3)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawOrganization::into_organization).transpose()
  }

  async fn add_provider(&self, input: NewProvider) -> Result<Provider> {
    let provider = Provider {
      provider_id:     Uuid::new_v4(),
      organization_id: input.organization_id,
      name:            input.name,
      credential:      input.credential,
      email:           input.email,
      created_at:      Utc::now(),
    };

    let id_str     = encode_uuid(provider.provider_id);
    let org_str    = encode_uuid(provider.organization_id);
    let name       = provider.name.clone();
    let credential = provider.credential.clone();
    let email      = provider.email.clone();
    let at_str     = encode_dt(provider.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO providers
             (provider_id, organization_id, name, credential, email, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, org_str, name, credential, email, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(provider)
  }

  async fn get_provider(&self, id: Uuid) -> Result<Option<Provider>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawProvider> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT provider_id, organization_id, name, credential, email, created_at
             FROM providers WHERE provider_id = ?1",
            rusqlite::params![id_str],
            |row| {
              Ok(RawProvider {
                provider_id:     row.get(0)?,
                organization_id: row.get(1)?,
                name:            row.get(2)?,
                credential:      row.get(3)?,
                email:           row.get(4)?,
                created_at:      row.get(5)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawProvider::into_provider).transpose()
  }

  async fn list_providers(&self, organization_id: Uuid) -> Result<Vec<Provider>> {
    let org_str = encode_uuid(organization_id);

    let raws: Vec<RawProvider> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT provider_id, organization_id, name, credential, email, created_at
           FROM providers WHERE organization_id = ?1 ORDER BY name",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![org_str], |row| {
            Ok(RawProvider {
              provider_id:     row.get(0)?,
              organization_id: row.get(1)?,
              name:            row.get(2)?,
              credential:      row.get(3)?,
              email:           row.get(4)?,
              created_at:      row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProvider::into_provider).collect()
  }

  // ── Goal bank ─────────────────────────────────────────────────────────────

  async fn add_goal(&self, input: NewGoalDefinition) -> Result<GoalDefinition> {
    let goal = GoalDefinition {
      goal_id:          Uuid::new_v4(),
      organization_id:  input.organization_id,
      category:         input.category,
      description:      input.description,
      criteria:         input.criteria,
      mastery_baseline: input.mastery_baseline,
      created_at:       Utc::now(),
    };

    let id_str      = encode_uuid(goal.goal_id);
    let org_str     = encode_uuid(goal.organization_id);
    let category    = goal.category.clone();
    let description = goal.description.clone();
    let percentage  = i64::from(goal.criteria.mastery_percentage);
    let sessions    = goal.criteria.across_sessions.map(i64::from);
    let level_str   = encode_support_level(goal.criteria.support_level).to_owned();
    let baseline    = goal.mastery_baseline.map(i64::from);
    let at_str      = encode_dt(goal.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO goal_bank
             (goal_id, organization_id, category, description,
              mastery_percentage, across_sessions, support_level,
              mastery_baseline, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            id_str,
            org_str,
            category,
            description,
            percentage,
            sessions,
            level_str,
            baseline,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(goal)
  }

  async fn get_goal(&self, id: Uuid) -> Result<Option<GoalDefinition>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawGoal> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT goal_id, organization_id, category, description,
                    mastery_percentage, across_sessions, support_level,
                    mastery_baseline, created_at
             FROM goal_bank WHERE goal_id = ?1",
            rusqlite::params![id_str],
            |row| {
              Ok(RawGoal {
                goal_id:            row.get(0)?,
                organization_id:    row.get(1)?,
                category:           row.get(2)?,
                description:        row.get(3)?,
                mastery_percentage: row.get(4)?,
                across_sessions:    row.get(5)?,
                support_level:      row.get(6)?,
                mastery_baseline:   row.get(7)?,
                created_at:         row.get(8)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawGoal::into_goal).transpose()
  }

  async fn list_goals(&self, organization_id: Uuid) -> Result<Vec<GoalDefinition>> {
    let org_str = encode_uuid(organization_id);

    let raws: Vec<RawGoal> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT goal_id, organization_id, category, description,
                  mastery_percentage, across_sessions, support_level,
                  mastery_baseline, created_at
           FROM goal_bank WHERE organization_id = ?1
           ORDER BY created_at DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![org_str], |row| {
            Ok(RawGoal {
              goal_id:            row.get(0)?,
              organization_id:    row.get(1)?,
              category:           row.get(2)?,
              description:        row.get(3)?,
              mastery_percentage: row.get(4)?,
              across_sessions:    row.get(5)?,
              support_level:      row.get(6)?,
              mastery_baseline:   row.get(7)?,
              created_at:         row.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawGoal::into_goal).collect()
  }

  // ── Clients & goal assignments ────────────────────────────────────────────

  async fn add_client(&self, input: NewClient) -> Result<Client> {
    let client = Client {
      client_id:          Uuid::new_v4(),
      organization_id:    input.organization_id,
      name:               input.name,
      dob:                input.dob,
      diagnosis:          input.diagnosis,
      parent_name:        input.parent_name,
      email:              input.email,
      phone:              input.phone,
      assigned_providers: input.assigned_providers,
      review_date:        input.review_date,
      status:             ClientStatus::Active,
      created_at:         Utc::now(),
    };

    let id_str        = encode_uuid(client.client_id);
    let org_str       = encode_uuid(client.organization_id);
    let name          = client.name.clone();
    let dob_str       = client.dob.map(encode_date);
    let diagnosis     = client.diagnosis.clone();
    let parent_name   = client.parent_name.clone();
    let email         = client.email.clone();
    let phone         = client.phone.clone();
    let providers_str = encode_uuid_list(&client.assigned_providers)?;
    let review_str    = client.review_date.map(encode_date);
    let status_str    = encode_client_status(client.status).to_owned();
    let at_str        = encode_dt(client.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO clients
             (client_id, organization_id, name, dob, diagnosis, parent_name,
              email, phone, assigned_providers, review_date, status,
              created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
          rusqlite::params![
            id_str,
            org_str,
            name,
            dob_str,
            diagnosis,
            parent_name,
            email,
            phone,
            providers_str,
            review_str,
            status_str,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(client)
  }

  async fn get_client(&self, id: Uuid) -> Result<Option<Client>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawClient> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT client_id, organization_id, name, dob, diagnosis,
                    parent_name, email, phone, assigned_providers,
                    review_date, status, created_at
             FROM clients WHERE client_id = ?1",
            rusqlite::params![id_str],
            |row| {
              Ok(RawClient {
                client_id:          row.get(0)?,
                organization_id:    row.get(1)?,
                name:               row.get(2)?,
                dob:                row.get(3)?,
                diagnosis:          row.get(4)?,
                parent_name:        row.get(5)?,
                email:              row.get(6)?,
                phone:              row.get(7)?,
                assigned_providers: row.get(8)?,
                review_date:        row.get(9)?,
                status:             row.get(10)?,
                created_at:         row.get(11)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawClient::into_client).transpose()
  }

  async fn list_clients(&self, organization_id: Uuid) -> Result<Vec<Client>> {
    let org_str = encode_uuid(organization_id);

    let raws: Vec<RawClient> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT client_id, organization_id, name, dob, diagnosis,
                  parent_name, email, phone, assigned_providers,
                  review_date, status, created_at
           FROM clients
           WHERE organization_id = ?1 AND status = 'active'
           ORDER BY name",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![org_str], |row| {
            Ok(RawClient {
              client_id:          row.get(0)?,
              organization_id:    row.get(1)?,
              name:               row.get(2)?,
              dob:                row.get(3)?,
              diagnosis:          row.get(4)?,
              parent_name:        row.get(5)?,
              email:              row.get(6)?,
              phone:              row.get(7)?,
              assigned_providers: row.get(8)?,
              review_date:        row.get(9)?,
              status:             row.get(10)?,
              created_at:         row.get(11)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawClient::into_client).collect()
  }

  async fn assign_goal(
    &self,
    client_id: Uuid,
    input: NewGoalAssignment,
  ) -> Result<GoalAssignment> {
    let assignment = GoalAssignment {
      assignment_id:       Uuid::new_v4(),
      goal_id:             input.goal_id,
      goal_status:         GoalStatus::InProgress,
      target_date:         input.target_date,
      baseline_percentage: input.baseline_percentage,
      success_rate:        None,
      status_date:         None,
      reason:              None,
      assigned_at:         Utc::now(),
    };

    let assignment_str = encode_uuid(assignment.assignment_id);
    let client_str     = encode_uuid(client_id);
    let goal_str       = encode_uuid(assignment.goal_id);
    let status_str     = encode_goal_status(assignment.goal_status).to_owned();
    let target_str     = assignment.target_date.map(encode_date);
    let baseline       = assignment.baseline_percentage.map(i64::from);
    let at_str         = encode_dt(assignment.assigned_at);

    let outcome: std::result::Result<(), AssignFailure> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let client_exists: bool = tx
          .query_row(
            "SELECT 1 FROM clients WHERE client_id = ?1",
            rusqlite::params![client_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !client_exists {
          return Ok(Err(AssignFailure::NoClient));
        }

        let goal_exists: bool = tx
          .query_row(
            "SELECT 1 FROM goal_bank WHERE goal_id = ?1",
            rusqlite::params![goal_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !goal_exists {
          return Ok(Err(AssignFailure::NoGoal));
        }

        let duplicate: bool = tx
          .query_row(
            "SELECT 1 FROM goal_assignments
             WHERE client_id = ?1 AND goal_id = ?2
               AND goal_status = 'in_progress'",
            rusqlite::params![client_str, goal_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if duplicate {
          return Ok(Err(AssignFailure::Duplicate));
        }

        tx.execute(
          "INSERT INTO goal_assignments
             (assignment_id, client_id, goal_id, goal_status, target_date,
              baseline_percentage, assigned_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            assignment_str,
            client_str,
            goal_str,
            status_str,
            target_str,
            baseline,
            at_str,
          ],
        )?;
        tx.execute(
          "UPDATE clients SET goal_list_version = goal_list_version + 1
           WHERE client_id = ?1",
          rusqlite::params![client_str],
        )?;

        tx.commit()?;
        Ok(Ok(()))
      })
      .await?;

    match outcome {
      Ok(()) => Ok(assignment),
      Err(AssignFailure::NoClient) => Err(Error::ClientNotFound(client_id)),
      Err(AssignFailure::NoGoal) => Err(Error::GoalNotFound(input.goal_id)),
      Err(AssignFailure::Duplicate) => {
        Err(Error::DuplicateActiveAssignment(input.goal_id))
      }
    }
  }

  async fn goal_assignments(&self, client_id: Uuid) -> Result<GoalAssignmentList> {
    let client_str = encode_uuid(client_id);

    let (version, raws): (Option<i64>, Vec<RawAssignment>) = self
      .conn
      .call(move |conn| {
        let version: Option<i64> = conn
          .query_row(
            "SELECT goal_list_version FROM clients WHERE client_id = ?1",
            rusqlite::params![client_str],
            |row| row.get(0),
          )
          .optional()?;
        if version.is_none() {
          return Ok((None, vec![]));
        }

        let mut stmt = conn.prepare(
          "SELECT assignment_id, goal_id, goal_status, target_date,
                  baseline_percentage, success_rate, status_date, reason,
                  assigned_at
           FROM goal_assignments WHERE client_id = ?1
           ORDER BY assigned_at",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![client_str], |row| {
            Ok(RawAssignment {
              assignment_id:       row.get(0)?,
              goal_id:             row.get(1)?,
              goal_status:         row.get(2)?,
              target_date:         row.get(3)?,
              baseline_percentage: row.get(4)?,
              success_rate:        row.get(5)?,
              status_date:         row.get(6)?,
              reason:              row.get(7)?,
              assigned_at:         row.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((version, rows))
      })
      .await?;

    let version = version.ok_or(Error::ClientNotFound(client_id))?;
    let entries = raws
      .into_iter()
      .map(RawAssignment::into_assignment)
      .collect::<Result<Vec<_>>>()?;

    Ok(GoalAssignmentList { version, entries })
  }

  async fn apply_status_change(
    &self,
    client_id: Uuid,
    assignment_id: Uuid,
    change: StatusChange,
    expected_version: i64,
  ) -> Result<(GoalAssignment, i64)> {
    let client_str     = encode_uuid(client_id);
    let assignment_str = encode_uuid(assignment_id);
    let status_str     = encode_goal_status(change.status).to_owned();
    let rate           = change.success_rate.map(i64::from);
    let reason         = change.reason.clone();
    let at_str         = encode_dt(change.at);

    let outcome: std::result::Result<(RawAssignment, i64), ChangeFailure> =
      self
        .conn
        .call(move |conn| {
          let tx = conn.transaction()?;

          let found: Option<i64> = tx
            .query_row(
              "SELECT goal_list_version FROM clients WHERE client_id = ?1",
              rusqlite::params![client_str],
              |row| row.get(0),
            )
            .optional()?;
          let Some(found) = found else {
            return Ok(Err(ChangeFailure::NoClient));
          };
          if found != expected_version {
            return Ok(Err(ChangeFailure::Conflict { found }));
          }

          let updated = tx.execute(
            "UPDATE goal_assignments
             SET goal_status  = ?3,
                 status_date  = ?4,
                 success_rate = COALESCE(?5, success_rate),
                 reason       = COALESCE(?6, reason)
             WHERE assignment_id = ?1 AND client_id = ?2",
            rusqlite::params![
              assignment_str,
              client_str,
              status_str,
              at_str,
              rate,
              reason,
            ],
          )?;
          if updated == 0 {
            return Ok(Err(ChangeFailure::NoAssignment));
          }

          tx.execute(
            "UPDATE clients SET goal_list_version = goal_list_version + 1
             WHERE client_id = ?1",
            rusqlite::params![client_str],
          )?;

          let raw = tx.query_row(
            "SELECT assignment_id, goal_id, goal_status, target_date,
                    baseline_percentage, success_rate, status_date, reason,
                    assigned_at
             FROM goal_assignments WHERE assignment_id = ?1",
            rusqlite::params![assignment_str],
            |row| {
              Ok(RawAssignment {
                assignment_id:       row.get(0)?,
                goal_id:             row.get(1)?,
                goal_status:         row.get(2)?,
                target_date:         row.get(3)?,
                baseline_percentage: row.get(4)?,
                success_rate:        row.get(5)?,
                status_date:         row.get(6)?,
                reason:              row.get(7)?,
                assigned_at:         row.get(8)?,
              })
            },
          )?;

          tx.commit()?;
          Ok(Ok((raw, expected_version + 1)))
        })
        .await?;

    match outcome {
      Ok((raw, new_version)) => Ok((raw.into_assignment()?, new_version)),
      Err(ChangeFailure::NoClient) => Err(Error::ClientNotFound(client_id)),
      Err(ChangeFailure::NoAssignment) => {
        Err(Error::AssignmentNotFound(assignment_id))
      }
      Err(ChangeFailure::Conflict { found }) => Err(Error::VersionConflict {
        expected: expected_version,
        found,
      }),
    }
  }

  // ── Sessions & data collection ────────────────────────────────────────────

  async fn start_session(&self, input: NewSessionRecord) -> Result<SessionRecord> {
    let session = SessionRecord {
      session_id:       Uuid::new_v4(),
      client_id:        input.client_id,
      provider_id:      input.provider_id,
      organization_id:  input.organization_id,
      session_type:     input.session_type,
      date_of_session:  input.date_of_session,
      start_time:       input.start_time,
      end_time:         input.end_time,
      client_variables: input.client_variables,
      created_at:       Utc::now(),
    };

    let id_str       = encode_uuid(session.session_id);
    let client_str   = encode_uuid(session.client_id);
    let provider_str = encode_uuid(session.provider_id);
    let org_str      = encode_uuid(session.organization_id);
    let type_str     = encode_session_type(session.session_type).to_owned();
    let date_str     = encode_date(session.date_of_session);
    let start_str    = session.start_time.map(encode_dt);
    let end_str      = session.end_time.map(encode_dt);
    let variables    = session.client_variables.clone();
    let at_str       = encode_dt(session.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions
             (session_id, client_id, provider_id, organization_id,
              session_type, date_of_session, start_time, end_time,
              client_variables, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          rusqlite::params![
            id_str,
            client_str,
            provider_str,
            org_str,
            type_str,
            date_str,
            start_str,
            end_str,
            variables,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(session)
  }

  async fn get_session(&self, id: Uuid) -> Result<Option<SessionRecord>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT session_id, client_id, provider_id, organization_id,
                    session_type, date_of_session, start_time, end_time,
                    client_variables, created_at
             FROM sessions WHERE session_id = ?1",
            rusqlite::params![id_str],
            |row| {
              Ok(RawSession {
                session_id:       row.get(0)?,
                client_id:        row.get(1)?,
                provider_id:      row.get(2)?,
                organization_id:  row.get(3)?,
                session_type:     row.get(4)?,
                date_of_session:  row.get(5)?,
                start_time:       row.get(6)?,
                end_time:         row.get(7)?,
                client_variables: row.get(8)?,
                created_at:       row.get(9)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSession::into_session).transpose()
  }

  async fn list_client_sessions(&self, client_id: Uuid) -> Result<Vec<SessionRecord>> {
    let client_str = encode_uuid(client_id);

    let raws: Vec<RawSession> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT session_id, client_id, provider_id, organization_id,
                  session_type, date_of_session, start_time, end_time,
                  client_variables, created_at
           FROM sessions WHERE client_id = ?1
           ORDER BY date_of_session DESC, created_at DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![client_str], |row| {
            Ok(RawSession {
              session_id:       row.get(0)?,
              client_id:        row.get(1)?,
              provider_id:      row.get(2)?,
              organization_id:  row.get(3)?,
              session_type:     row.get(4)?,
              date_of_session:  row.get(5)?,
              start_time:       row.get(6)?,
              end_time:         row.get(7)?,
              client_variables: row.get(8)?,
              created_at:       row.get(9)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSession::into_session).collect()
  }

  async fn record_collection(
    &self,
    input: NewDataCollection,
  ) -> Result<DataCollection> {
    let recorded_at = Utc::now();
    let collection_id = Uuid::new_v4();

    let trials: Vec<TrialRecord> = input
      .trials
      .iter()
      .map(|t| TrialRecord {
        goal_id: t.goal_id,
        support: t.support,
        total: t.total,
        counter: t.counter,
        recorded_at,
      })
      .collect();

    // (trial_id, goal_id, support_json, total, counter) per row.
    let trial_rows: Vec<(String, String, String, i64, i64)> = trials
      .iter()
      .map(|t| {
        Ok((
          encode_uuid(Uuid::new_v4()),
          encode_uuid(t.goal_id),
          encode_support(&t.support)?,
          i64::from(t.total),
          i64::from(t.counter),
        ))
      })
      .collect::<Result<_>>()?;

    let collection_str = encode_uuid(collection_id);
    let session_str    = encode_uuid(input.session_id);
    let client_str     = encode_uuid(input.client_id);
    let activities_str = encode_string_list(&input.activities_engaged)?;
    let supports_str   = encode_string_list(&input.supports_observed)?;
    let duration       = input.duration_secs.map(i64::from);
    let observation    = input.provider_observation.clone();
    let at_str         = encode_dt(recorded_at);

    let org_str: Option<String> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let org: Option<String> = tx
          .query_row(
            "SELECT organization_id FROM sessions WHERE session_id = ?1",
            rusqlite::params![session_str],
            |row| row.get(0),
          )
          .optional()?;
        let Some(org) = org else {
          return Ok(None);
        };

        tx.execute(
          "INSERT INTO data_collections
             (collection_id, session_id, client_id, organization_id,
              activities_engaged, supports_observed, duration_secs,
              provider_observation, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            collection_str,
            session_str,
            client_str,
            org,
            activities_str,
            supports_str,
            duration,
            observation,
            at_str,
          ],
        )?;

        for (trial_str, goal_str, support_json, total, counter) in &trial_rows {
          tx.execute(
            "INSERT INTO trials
               (trial_id, collection_id, client_id, goal_id, support_json,
                total, counter, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
              trial_str,
              collection_str,
              client_str,
              goal_str,
              support_json,
              total,
              counter,
              at_str,
            ],
          )?;
        }

        tx.commit()?;
        Ok(Some(org))
      })
      .await?;

    let org_str = org_str.ok_or(Error::SessionNotFound(input.session_id))?;

    Ok(DataCollection {
      collection_id,
      session_id: input.session_id,
      client_id: input.client_id,
      organization_id: crate::encode::decode_uuid(&org_str)?,
      trials,
      activities_engaged: input.activities_engaged,
      supports_observed: input.supports_observed,
      duration_secs: input.duration_secs,
      provider_observation: input.provider_observation,
      recorded_at,
    })
  }

  async fn latest_collection(
    &self,
    session_id: Uuid,
  ) -> Result<Option<DataCollection>> {
    let session_str = encode_uuid(session_id);

    let raw: Option<(RawCollection, Vec<RawTrial>)> = self
      .conn
      .call(move |conn| {
        let raw: Option<RawCollection> = conn
          .query_row(
            "SELECT collection_id, session_id, client_id, organization_id,
                    activities_engaged, supports_observed, duration_secs,
                    provider_observation, recorded_at
             FROM data_collections WHERE session_id = ?1
             ORDER BY recorded_at DESC LIMIT 1",
            rusqlite::params![session_str],
            |row| {
              Ok(RawCollection {
                collection_id:        row.get(0)?,
                session_id:           row.get(1)?,
                client_id:            row.get(2)?,
                organization_id:      row.get(3)?,
                activities_engaged:   row.get(4)?,
                supports_observed:    row.get(5)?,
                duration_secs:        row.get(6)?,
                provider_observation: row.get(7)?,
                recorded_at:          row.get(8)?,
              })
            },
          )
          .optional()?;

        let Some(raw) = raw else { return Ok(None) };
        let trials = Self::collection_trials(conn, &raw.collection_id)?;
        Ok(Some((raw, trials)))
      })
      .await?;

    let Some((raw, raw_trials)) = raw else { return Ok(None) };
    let trials = raw_trials
      .into_iter()
      .map(RawTrial::into_trial)
      .collect::<Result<Vec<_>>>()?;
    Ok(Some(raw.into_collection(trials)?))
  }

  // ── Engine reads ──────────────────────────────────────────────────────────

  async fn recent_trials(
    &self,
    client_id: Uuid,
    goal_id: Uuid,
    limit: u32,
  ) -> Result<Vec<TrialRecord>> {
    let client_str = encode_uuid(client_id);
    let goal_str   = encode_uuid(goal_id);
    let limit_val  = i64::from(limit);

    let raws: Vec<RawTrial> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT goal_id, support_json, total, counter, recorded_at
           FROM trials WHERE client_id = ?1 AND goal_id = ?2
           ORDER BY recorded_at DESC, trial_id DESC
           LIMIT ?3",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![client_str, goal_str, limit_val], |row| {
            Ok(RawTrial {
              goal_id:      row.get(0)?,
              support_json: row.get(1)?,
              total:        row.get(2)?,
              counter:      row.get(3)?,
              recorded_at:  row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    // Query is newest-first for the LIMIT; callers want chronological.
    let mut trials = raws
      .into_iter()
      .map(RawTrial::into_trial)
      .collect::<Result<Vec<_>>>()?;
    trials.reverse();
    Ok(trials)
  }

  async fn collections_in_window(
    &self,
    client_id: Uuid,
    from: chrono::DateTime<Utc>,
    to: chrono::DateTime<Utc>,
  ) -> Result<Vec<DataCollection>> {
    let client_str = encode_uuid(client_id);
    let from_str   = encode_dt(from);
    let to_str     = encode_dt(to);

    let raws: Vec<(RawCollection, Vec<RawTrial>)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT collection_id, session_id, client_id, organization_id,
                  activities_engaged, supports_observed, duration_secs,
                  provider_observation, recorded_at
           FROM data_collections
           WHERE client_id = ?1 AND recorded_at >= ?2 AND recorded_at <= ?3
           ORDER BY recorded_at",
        )?;
        let collections = stmt
          .query_map(rusqlite::params![client_str, from_str, to_str], |row| {
            Ok(RawCollection {
              collection_id:        row.get(0)?,
              session_id:           row.get(1)?,
              client_id:            row.get(2)?,
              organization_id:      row.get(3)?,
              activities_engaged:   row.get(4)?,
              supports_observed:    row.get(5)?,
              duration_secs:        row.get(6)?,
              provider_observation: row.get(7)?,
              recorded_at:          row.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(collections.len());
        for raw in collections {
          let trials = Self::collection_trials(conn, &raw.collection_id)?;
          out.push((raw, trials));
        }
        Ok(out)
      })
      .await?;

    raws
      .into_iter()
      .map(|(raw, raw_trials)| {
        let trials = raw_trials
          .into_iter()
          .map(RawTrial::into_trial)
          .collect::<Result<Vec<_>>>()?;
        raw.into_collection(trials)
      })
      .collect()
  }

  async fn clients_with_overdue_goals(&self, today: NaiveDate) -> Result<Vec<Uuid>> {
    let today_str = encode_date(today);

    let ids: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT DISTINCT client_id FROM goal_assignments
           WHERE goal_status = 'in_progress'
             AND target_date IS NOT NULL
             AND target_date <= ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![today_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    ids.iter().map(|s| crate::encode::decode_uuid(s)).collect()
  }

  // ── Audit trail ───────────────────────────────────────────────────────────

  async fn record_audit_event(&self, input: NewAuditEvent) -> Result<AuditEvent> {
    let event = AuditEvent {
      event_id:        Uuid::new_v4(),
      organization_id: input.organization_id,
      actor_id:        input.actor_id,
      action:          input.action,
      resource:        input.resource,
      resource_id:     input.resource_id,
      outcome:         input.outcome,
      detail:          input.detail,
      recorded_at:     Utc::now(),
    };

    let id_str       = encode_uuid(event.event_id);
    let org_str      = encode_uuid(event.organization_id);
    let actor_str    = encode_uuid(event.actor_id);
    let action_str   = event.action.label().to_owned();
    let resource_str = event.resource.label().to_owned();
    let target_str   = event.resource_id.map(encode_uuid);
    let outcome_str  = event.outcome.label().to_owned();
    let detail       = event.detail.clone();
    let at_str       = encode_dt(event.recorded_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO audit_events
             (event_id, organization_id, actor_id, action, resource,
              resource_id, outcome, detail, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            id_str,
            org_str,
            actor_str,
            action_str,
            resource_str,
            target_str,
            outcome_str,
            detail,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(event)
  }

  async fn list_audit_events(
    &self,
    organization_id: Uuid,
    limit: u32,
  ) -> Result<Vec<AuditEvent>> {
    let org_str   = encode_uuid(organization_id);
    let limit_val = i64::from(limit);

    let raws: Vec<RawAuditEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT event_id, organization_id, actor_id, action, resource,
                  resource_id, outcome, detail, recorded_at
           FROM audit_events WHERE organization_id = ?1
           ORDER BY recorded_at DESC LIMIT ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![org_str, limit_val], |row| {
            Ok(RawAuditEvent {
              event_id:        row.get(0)?,
              organization_id: row.get(1)?,
              actor_id:        row.get(2)?,
              action:          row.get(3)?,
              resource:        row.get(4)?,
              resource_id:     row.get(5)?,
              outcome:         row.get(6)?,
              detail:          row.get(7)?,
              recorded_at:     row.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAuditEvent::into_event).collect()
  }
}
