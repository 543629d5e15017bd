//! Request dispatch

use hos_api::{
    ClientInfo, Command, ErrorCode, ErrorInfo, Event, EventPayload, HealthStatus, Request,
    Response, ResponsePayload, API_VERSION,
};
use hos_core::{CoreError, CoreEvent, HosEngine, TransitionResult};
use hos_util::DriverId;
use std::sync::Arc;
use tracing::{debug, warn};

/// A response and the events it caused
#[derive(Debug)]
pub struct Handled {
    pub response: Response,
    pub events: Vec<Event>,
}

impl Handled {
    fn reply(response: Response) -> Self {
        Self {
            response,
            events: Vec::new(),
        }
    }
}

/// Maps protocol commands onto the engine
pub struct RequestHandler {
    engine: Arc<HosEngine>,
}

impl RequestHandler {
    pub fn new(engine: Arc<HosEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &HosEngine {
        &self.engine
    }

    /// Handle one request from `client`
    pub fn handle(&self, client: &ClientInfo, request: Request) -> Handled {
        let request_id = request.request_id;

        if request.api_version != API_VERSION {
            return Handled::reply(Response::error(
                request_id,
                ErrorInfo::new(
                    ErrorCode::UnsupportedVersion,
                    format!(
                        "API version {} not supported, expected {}",
                        request.api_version, API_VERSION
                    ),
                ),
            ));
        }

        debug!(client_id = %client.client_id, request_id, command = ?request.command, "Handling request");

        match request.command {
            Command::GetSummary { driver_id } => {
                if let Err(response) = check_driver_id(request_id, &driver_id) {
                    return Handled::reply(response);
                }
                Handled::reply(match self.engine.get_summary(&driver_id) {
                    Ok(summary) => Response::success(request_id, ResponsePayload::Summary(summary)),
                    Err(e) => core_error(request_id, e),
                })
            }

            Command::ChangeDutyStatus {
                driver_id,
                status,
                location,
            } => {
                if !client.role.can_change_status() {
                    return Handled::reply(permission_denied(
                        request_id,
                        "Role cannot change duty status",
                    ));
                }
                if let Err(response) = check_driver_id(request_id, &driver_id) {
                    return Handled::reply(response);
                }
                match self.engine.change_duty_status(&driver_id, status, location) {
                    Ok(result) => mutation(request_id, result),
                    Err(e) => Handled::reply(core_error(request_id, e)),
                }
            }

            Command::CanAcceptLoad { driver_id } => {
                if let Err(response) = check_driver_id(request_id, &driver_id) {
                    return Handled::reply(response);
                }
                Handled::reply(match self.engine.can_accept_load(&driver_id) {
                    Ok(result) => Response::success(request_id, ResponsePayload::Eligibility(result)),
                    Err(e) => core_error(request_id, e),
                })
            }

            Command::GetDailyLog { driver_id, date } => {
                if let Err(response) = check_driver_id(request_id, &driver_id) {
                    return Handled::reply(response);
                }
                Handled::reply(match self.engine.daily_log(&driver_id, date) {
                    Ok(entries) => Response::success(
                        request_id,
                        ResponsePayload::DailyLog {
                            driver_id,
                            date,
                            entries,
                        },
                    ),
                    Err(e) => core_error(request_id, e),
                })
            }

            Command::SetCycleDays {
                driver_id,
                cycle_days,
            } => {
                if !client.role.can_administer() {
                    return Handled::reply(permission_denied(request_id, "Admin role required"));
                }
                if let Err(response) = check_driver_id(request_id, &driver_id) {
                    return Handled::reply(response);
                }
                match self.engine.set_cycle_days(&driver_id, cycle_days) {
                    Ok(result) => mutation(request_id, result),
                    Err(e) => Handled::reply(core_error(request_id, e)),
                }
            }

            Command::GetHealth => {
                let store_ok = self.engine.is_healthy();
                let health = HealthStatus {
                    live: true,
                    ready: store_ok,
                    store_ok,
                    mock_time: hos_util::is_mock_time_active(),
                };
                Handled::reply(Response::success(request_id, ResponsePayload::Health(health)))
            }

            Command::SubscribeEvents => Handled::reply(Response::success(
                request_id,
                ResponsePayload::Subscribed {
                    client_id: client.client_id.clone(),
                },
            )),

            Command::UnsubscribeEvents => {
                Handled::reply(Response::success(request_id, ResponsePayload::Unsubscribed))
            }

            Command::Ping => Handled::reply(Response::success(request_id, ResponsePayload::Pong)),
        }
    }
}

/// Event broadcast to subscribers for an engine event, if any
pub fn event_payload(event: CoreEvent) -> Option<EventPayload> {
    match event {
        CoreEvent::DutyStatusChanged {
            driver_id,
            from,
            to,
            at,
            elapsed,
            location,
        } => Some(EventPayload::DutyStatusChanged {
            driver_id,
            from,
            to,
            at,
            elapsed,
            location,
        }),
        CoreEvent::ViolationRecorded {
            driver_id,
            violation,
        } => Some(EventPayload::ViolationRecorded {
            driver_id,
            violation,
        }),
        CoreEvent::ResetApplied { driver_id, reset } => {
            Some(EventPayload::ResetApplied { driver_id, reset })
        }
        CoreEvent::DayArchived {
            driver_id,
            day,
            entries,
        } => Some(EventPayload::DayArchived {
            driver_id,
            date: day,
            entries,
        }),
        // Internal bookkeeping; subscribers see the summary that follows
        CoreEvent::LedgerCreated { .. } | CoreEvent::CycleChanged { .. } => None,
    }
}

fn mutation(request_id: u64, result: TransitionResult) -> Handled {
    let mut events: Vec<Event> = result
        .events
        .into_iter()
        .filter_map(event_payload)
        .map(Event::new)
        .collect();
    events.push(Event::new(EventPayload::SummaryUpdated(result.summary.clone())));

    Handled {
        response: Response::success(request_id, ResponsePayload::Summary(result.summary)),
        events,
    }
}

fn check_driver_id(request_id: u64, driver_id: &DriverId) -> Result<(), Response> {
    if driver_id.as_str().trim().is_empty() {
        return Err(Response::error(
            request_id,
            ErrorInfo::new(ErrorCode::InvalidRequest, "driver_id must not be empty"),
        ));
    }
    Ok(())
}

fn permission_denied(request_id: u64, message: &str) -> Response {
    Response::error(
        request_id,
        ErrorInfo::new(ErrorCode::PermissionDenied, message),
    )
}

fn core_error(request_id: u64, err: CoreError) -> Response {
    warn!(request_id, error = %err, "Engine request failed");
    let code = if err.is_infrastructure() {
        ErrorCode::StoreUnavailable
    } else {
        ErrorCode::InternalError
    };
    Response::error(request_id, ErrorInfo::new(code, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hos_api::{ClientRole, CycleDays, DutyStatus, ResponseResult};
    use hos_core::EngineConfig;
    use hos_store::SqliteStore;
    use hos_util::ManualClock;

    fn handler() -> (RequestHandler, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at(2025, 6, 10, 6, 0).unwrap());
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let engine = HosEngine::new(store, clock.clone(), EngineConfig::default());
        (RequestHandler::new(Arc::new(engine)), clock)
    }

    fn error_code(handled: &Handled) -> Option<ErrorCode> {
        match &handled.response.result {
            ResponseResult::Err(e) => Some(e.code),
            ResponseResult::Ok(_) => None,
        }
    }

    fn drive(driver: &str) -> Request {
        Request::new(
            1,
            Command::ChangeDutyStatus {
                driver_id: DriverId::new(driver),
                status: DutyStatus::Driving,
                location: None,
            },
        )
    }

    #[test]
    fn test_change_status_broadcasts_transition_and_summary() {
        let (handler, _clock) = handler();
        let client = ClientInfo::new(ClientRole::Dispatcher);

        let handled = handler.handle(&client, drive("drv-001"));

        match &handled.response.result {
            ResponseResult::Ok(ResponsePayload::Summary(summary)) => {
                assert_eq!(summary.status, DutyStatus::Driving);
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(matches!(
            handled.events.first().map(|e| &e.payload),
            Some(EventPayload::DutyStatusChanged { .. })
        ));
        assert!(matches!(
            handled.events.last().map(|e| &e.payload),
            Some(EventPayload::SummaryUpdated(_))
        ));
    }

    #[test]
    fn test_observer_cannot_change_status() {
        let (handler, _clock) = handler();
        let client = ClientInfo::new(ClientRole::Observer);

        let handled = handler.handle(&client, drive("drv-001"));
        assert_eq!(error_code(&handled), Some(ErrorCode::PermissionDenied));
        assert!(handled.events.is_empty());
    }

    #[test]
    fn test_set_cycle_requires_admin() {
        let (handler, _clock) = handler();
        let request = || {
            Request::new(
                2,
                Command::SetCycleDays {
                    driver_id: DriverId::new("drv-001"),
                    cycle_days: CycleDays::Seven,
                },
            )
        };

        let denied = handler.handle(&ClientInfo::new(ClientRole::Dispatcher), request());
        assert_eq!(error_code(&denied), Some(ErrorCode::PermissionDenied));

        let allowed = handler.handle(&ClientInfo::new(ClientRole::Admin), request());
        match allowed.response.result {
            ResponseResult::Ok(ResponsePayload::Summary(summary)) => {
                assert_eq!(summary.cycle_days, CycleDays::Seven);
                assert_eq!(summary.cycle.limit_hours, 60.0);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_empty_driver_id_is_invalid() {
        let (handler, _clock) = handler();
        let client = ClientInfo::new(ClientRole::Admin);

        let handled = handler.handle(
            &client,
            Request::new(
                3,
                Command::GetSummary {
                    driver_id: DriverId::new("  "),
                },
            ),
        );
        assert_eq!(error_code(&handled), Some(ErrorCode::InvalidRequest));
    }

    #[test]
    fn test_unsupported_version() {
        let (handler, _clock) = handler();
        let mut request = Request::new(4, Command::Ping);
        request.api_version = API_VERSION + 1;

        let handled = handler.handle(&ClientInfo::new(ClientRole::Admin), request);
        assert_eq!(error_code(&handled), Some(ErrorCode::UnsupportedVersion));
    }

    #[test]
    fn test_load_gate_and_health() {
        let (handler, clock) = handler();
        let client = ClientInfo::new(ClientRole::Dispatcher);

        handler.handle(&client, drive("drv-001"));
        clock.advance_minutes(60);

        let handled = handler.handle(
            &client,
            Request::new(
                5,
                Command::CanAcceptLoad {
                    driver_id: DriverId::new("drv-001"),
                },
            ),
        );
        match handled.response.result {
            ResponseResult::Ok(ResponsePayload::Eligibility(result)) => {
                assert!(result.allowed);
                assert_eq!(result.summary.driving.used_hours, 1.0);
            }
            other => panic!("unexpected result {:?}", other),
        }

        let health = handler.handle(&client, Request::new(6, Command::GetHealth));
        match health.response.result {
            ResponseResult::Ok(ResponsePayload::Health(h)) => {
                assert!(h.live);
                assert!(h.store_ok);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_bookkeeping_events_are_not_broadcast() {
        assert!(
            event_payload(CoreEvent::LedgerCreated {
                driver_id: DriverId::new("drv-001"),
                cycle_days: CycleDays::Eight,
            })
            .is_none()
        );
    }
}
