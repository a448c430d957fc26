pub mod input_validator;
pub mod logging;

// Multi-step signup wizard (state machine, step rules, verification gate)
pub mod signup;
