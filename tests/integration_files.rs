//! Loading a scenario and its series files from disk.

use std::path::Path;

use river_sim::error::SimError;
use river_sim::session::Session;
use river_sim::sim::types::EngineState;

const MINI: &str = "scenarios/mini.toml";

#[test]
fn mini_scenario_loads_and_runs() {
    let mut session = Session::load_config(Path::new(MINI)).unwrap();
    assert!(session.diagnose().is_empty(), "{:?}", session.diagnose());
    assert_eq!(session.check_step_count().unwrap(), 5);
    session.build_dataset().unwrap();
    session.build_engine().unwrap();
    session.prepare().unwrap();

    assert_eq!(session.rest_price().unwrap(), 30.0);
    assert_eq!(session.get_price(0).unwrap(), 24.5);
    assert_eq!(session.get_price(4).unwrap(), 38.4);
    assert_eq!(session.get_inflow(0, 0).unwrap(), 2.4);
    assert_eq!(session.get_inflow(3, 1).unwrap(), 0.0);
    assert_eq!(session.get_action(1, 1).unwrap(), 0.5);
    assert_eq!(session.get_initial_level(0).unwrap(), 0.5);

    let summary = session.run().unwrap();
    assert_eq!(session.state(), EngineState::Ran);
    assert_eq!(summary.steps, 5);
    assert!(summary.balance.is_closed());

    // Requests from the action file are kept; blank cells follow the policy.
    assert_eq!(session.get_action(1, 1).unwrap(), 0.5);
    assert_eq!(session.get_action(1, 3).unwrap(), 1.0);
    assert_eq!(session.get_action(1, 0).unwrap(), 0.0);
    assert_eq!(session.get_action(1, 2).unwrap(), 1.0);
    let data = session.dataset().unwrap();
    assert_eq!(data.requested_action(1, 2).unwrap(), None);
    assert!(data.production(1, 3).unwrap() > data.production(1, 1).unwrap());
}

#[test]
fn short_series_is_rejected() {
    let mut session = Session::load_config(Path::new(MINI)).unwrap();
    session.config_mut().simulation.steps = 12;
    assert!(session.check_step_count().is_err());
    assert!(matches!(session.build_dataset(), Err(SimError::Series(_))));
}

#[test]
fn missing_file_names_the_path() {
    let mut session = Session::load_config(Path::new(MINI)).unwrap();
    session.config_mut().paths.price_file = "missing.csv".to_string();
    session.config_mut().resolve_paths();
    let err = session.build_dataset().unwrap_err();
    assert!(err.to_string().contains("missing.csv"), "{err}");
}
