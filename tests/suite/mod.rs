mod evaluator;
mod phase;
