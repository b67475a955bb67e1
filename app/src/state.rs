use sondeo::llm::Interpreter;
use sondeo::{ResultAggregator, RunSupervisor};

pub struct AppState {
    pub supervisor: RunSupervisor,
    pub aggregator: ResultAggregator,
    pub interpreter: Box<dyn Interpreter>,
}
