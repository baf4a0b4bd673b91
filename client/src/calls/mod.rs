pub mod abi;
pub mod contract_calls;
