//! Smoke, average-load and spike suites against the game statistics API.
//!
//! Each suite is an ordered list of cases. A case pairs a request template
//! with a step plan and an expectation; running it fires the plan through
//! the paced dispatcher and checks every outcome against the expectation.

use crate::api::client::{ApiClient, ApiRequest, HttpOutcome};
use crate::api::expectation::{BodyShape, Expectation};
use crate::engine::dispatcher::{DispatchReport, Operation, PacedDispatcher};
use crate::engine::outcome::{BoxError, InvocationId};
use crate::engine::plan::StepPlan;
use pacer_common::{GameData, ScenarioConfig, SuiteKind, GAME_DATA_FIELDS};
use rand::seq::SliceRandom;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const GAME_DATA_PATH: &str = "/gamedata";

/// Range of the random `totalBets` sent with updates.
const UPDATE_BETS_RANGE: std::ops::Range<i64> = 10..10_000;

/// How many mismatches are echoed to the log per failed case.
const LOGGED_MISMATCHES: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum RequestTemplate {
    ListAll,
    GetById(Vec<String>),
    Create(Vec<GameData>),
    Update(Vec<GameData>),
    DeleteById(Vec<String>),
}

impl RequestTemplate {
    /// Builds one request, picking ids and payloads at random from the fixtures.
    pub fn build(&self) -> Result<ApiRequest, BoxError> {
        let mut rng = rand::thread_rng();
        let request = match self {
            RequestTemplate::ListAll => ApiRequest::get(GAME_DATA_PATH),
            RequestTemplate::GetById(ids) => {
                let id = ids.choose(&mut rng).ok_or("no ids to fetch")?;
                ApiRequest::get(format!("{}/{}", GAME_DATA_PATH, id))
            }
            RequestTemplate::Create(payloads) => {
                let payload = payloads.choose(&mut rng).ok_or("no payloads to create")?;
                ApiRequest::post(GAME_DATA_PATH, serde_json::to_value(payload)?)
            }
            RequestTemplate::Update(records) => {
                let mut record = records
                    .choose(&mut rng)
                    .cloned()
                    .ok_or("no records to update")?;
                record.total_bets = rng.gen_range(UPDATE_BETS_RANGE);
                let id = record.id.clone().ok_or("update record has no id")?;
                ApiRequest::put(
                    format!("{}/{}", GAME_DATA_PATH, id),
                    serde_json::to_value(&record)?,
                )
            }
            RequestTemplate::DeleteById(ids) => {
                let id = ids.choose(&mut rng).ok_or("no ids to delete")?;
                ApiRequest::delete(format!("{}/{}", GAME_DATA_PATH, id))
            }
        };
        Ok(request)
    }
}

/// One HTTP call per invocation, built from a template.
#[derive(Debug, Clone)]
pub struct HttpOperation {
    client: ApiClient,
    template: RequestTemplate,
}

impl HttpOperation {
    pub fn new(client: ApiClient, template: RequestTemplate) -> Self {
        Self { client, template }
    }
}

impl Operation for HttpOperation {
    type Output = HttpOutcome;

    fn invoke(
        &self,
        _id: InvocationId,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<HttpOutcome, BoxError>> + Send {
        // Built before the future so the thread-local rng never crosses an await.
        let request = self.template.build();
        async move {
            let request = request?;
            self.client.send(&request, &cancel).await
        }
    }
}

#[derive(Debug, Clone)]
pub struct Case {
    pub name: &'static str,
    pub plan: StepPlan,
    pub template: RequestTemplate,
    pub expect: Expectation,
}

#[derive(Debug, Clone)]
pub struct Suite {
    pub kind: SuiteKind,
    pub cases: Vec<Case>,
}

impl Suite {
    pub fn build(kind: SuiteKind, scenario: &ScenarioConfig) -> Self {
        let fixtures = &scenario.fixtures;
        let list = RequestTemplate::ListAll;
        let get = RequestTemplate::GetById(fixtures.existing_ids.clone());
        let create = RequestTemplate::Create(fixtures.create_payloads.clone());
        let update = RequestTemplate::Update(fixtures.update_records.clone());
        let delete = RequestTemplate::DeleteById(fixtures.missing_ids.clone());

        let cases = match kind {
            // The smoke suite also checks the shape of every returned record.
            SuiteKind::Smoke => {
                let plan = StepPlan::single(scenario.smoke_requests);
                vec![
                    Case {
                        name: "list_game_data",
                        plan: plan.clone(),
                        template: list,
                        expect: Expectation::json(200, BodyShape::ArrayOfObjects(GAME_DATA_FIELDS)),
                    },
                    Case {
                        name: "get_game_data_by_id",
                        plan: plan.clone(),
                        template: get,
                        expect: Expectation::json(200, BodyShape::Object(GAME_DATA_FIELDS)),
                    },
                    Case {
                        name: "create_game_data",
                        plan: plan.clone(),
                        template: create,
                        expect: Expectation::status(201).with_body(BodyShape::Object(GAME_DATA_FIELDS)),
                    },
                    Case {
                        name: "update_game_data",
                        plan: plan.clone(),
                        template: update,
                        expect: Expectation::status(204),
                    },
                    Case {
                        name: "delete_missing_game_data",
                        plan,
                        template: delete,
                        expect: Expectation::status(404),
                    },
                ]
            }
            SuiteKind::Average => {
                let plan = StepPlan::new(scenario.average_steps.clone());
                load_cases(
                    [plan.clone(), plan.clone(), plan.clone(), plan.clone(), plan],
                    [list, get, update, delete, create],
                )
            }
            SuiteKind::Spike => {
                let spike = &scenario.spike;
                load_cases(
                    [
                        StepPlan::single(spike.list),
                        StepPlan::single(spike.get_by_id),
                        StepPlan::single(spike.update),
                        StepPlan::single(spike.delete),
                        StepPlan::single(spike.create),
                    ],
                    [list, get, update, delete, create],
                )
            }
        };

        Self { kind, cases }
    }

    /// Runs the cases one after another.
    pub async fn run(
        &self,
        client: &ApiClient,
        dispatcher: &PacedDispatcher,
        cancel: &CancellationToken,
    ) -> SuiteReport {
        info!(suite = %self.kind, cases = self.cases.len(), "Suite started");
        let mut cases = Vec::with_capacity(self.cases.len());
        for case in &self.cases {
            cases.push(run_case(case, client, dispatcher, cancel).await);
        }

        let report = SuiteReport {
            kind: self.kind,
            cases,
        };
        info!(
            suite = %self.kind,
            passed = report.passed(),
            failed_cases = report.failed_cases().count(),
            "Suite finished"
        );
        report
    }
}

/// list, get, update, delete, create: the case order of the load suites.
fn load_cases(plans: [StepPlan; 5], templates: [RequestTemplate; 5]) -> Vec<Case> {
    let names = [
        "list_game_data",
        "get_game_data_by_id",
        "update_game_data",
        "delete_missing_game_data",
        "create_game_data",
    ];
    let expectations = [
        Expectation::json(200, BodyShape::Any),
        Expectation::json(200, BodyShape::Any),
        Expectation::status(204),
        Expectation::status(404),
        Expectation::status(201),
    ];

    names
        .into_iter()
        .zip(plans)
        .zip(templates)
        .zip(expectations)
        .map(|(((name, plan), template), expect)| Case {
            name,
            plan,
            template,
            expect,
        })
        .collect()
}

pub async fn run_case(
    case: &Case,
    client: &ApiClient,
    dispatcher: &PacedDispatcher,
    cancel: &CancellationToken,
) -> CaseReport {
    info!(
        case = case.name,
        steps = ?case.plan.steps(),
        "Case started"
    );
    let op = HttpOperation::new(client.clone(), case.template.clone());
    let report = dispatcher.run_with_cancel(&case.plan, op, cancel).await;
    let result = CaseReport::evaluate(case.name, case.plan.total(), &case.expect, &report);

    if result.passed() {
        info!(case = case.name, summary = %result.summary(), "Case passed");
    } else {
        warn!(case = case.name, summary = %result.summary(), "Case failed");
        for failure in result.failures.iter().take(LOGGED_MISMATCHES) {
            warn!(case = case.name, invocation = %failure.id, reason = %failure.reason, "Mismatch");
        }
    }
    result
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseFailure {
    pub id: InvocationId,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct CaseReport {
    pub name: &'static str,
    /// Slots in the plan.
    pub expected: usize,
    /// Outcomes the run recorded.
    pub total: usize,
    pub passed: usize,
    /// Sorted by invocation sequence.
    pub failures: Vec<CaseFailure>,
    pub elapsed: Duration,
}

impl CaseReport {
    pub fn evaluate(
        name: &'static str,
        expected: usize,
        expect: &Expectation,
        report: &DispatchReport<HttpOutcome>,
    ) -> Self {
        let mut failures: Vec<CaseFailure> = report
            .outcomes
            .iter()
            .filter_map(|outcome| {
                let reason = match &outcome.result {
                    Ok(response) => expect.check(response).err()?.to_string(),
                    Err(failure) => failure.to_string(),
                };
                Some(CaseFailure {
                    id: outcome.id,
                    reason,
                })
            })
            .collect();
        failures.sort_by_key(|f| f.id.seq);

        Self {
            name,
            expected,
            total: report.len(),
            passed: report.len() - failures.len(),
            failures,
            elapsed: report.elapsed,
        }
    }

    pub fn passed(&self) -> bool {
        self.total == self.expected && self.failures.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "answered correctly {} of {} requests in {}ms",
            self.passed,
            self.expected,
            self.elapsed.as_millis()
        )
    }
}

#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub kind: SuiteKind,
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    pub fn passed(&self) -> bool {
        self.cases.iter().all(CaseReport::passed)
    }

    pub fn failed_cases(&self) -> impl Iterator<Item = &CaseReport> + '_ {
        self.cases.iter().filter(|case| !case.passed())
    }
}
