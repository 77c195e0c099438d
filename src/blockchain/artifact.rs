//! Compiled contract artifact (ABI + creation bytecode).
//!
//! Accepts Hardhat artifacts (`"bytecode": "0x…"`) and Foundry artifacts
//! (`"bytecode": { "object": "0x…" }`).

use std::path::Path;

use alloy::dyn_abi::{DynSolType, DynSolValue, FunctionExt, JsonAbiExt, Specifier};
use alloy::json_abi::{Function, JsonAbi, Param};
use alloy::primitives::Bytes;
use serde::Deserialize;

use crate::blockchain::types::{BlockchainError, BlockchainResult};

#[derive(Deserialize)]
struct RawArtifact {
    abi: JsonAbi,
    bytecode: RawBytecode,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(Bytes),
    Object { object: Bytes },
}

/// One deployable contract.
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    abi: JsonAbi,
    bytecode: Bytes,
}

impl ContractArtifact {
    /// Read an artifact JSON file.
    pub fn load(path: &Path) -> BlockchainResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BlockchainError::Artifact(format!("cannot read {}: {}", path.display(), e))
        })?;
        let artifact = Self::from_json(&content)?;
        tracing::debug!(
            path = %path.display(),
            functions = artifact.abi.functions.len(),
            bytecode_len = artifact.bytecode.len(),
            "Contract artifact loaded"
        );
        Ok(artifact)
    }

    pub fn from_json(json: &str) -> BlockchainResult<Self> {
        let raw: RawArtifact = serde_json::from_str(json)
            .map_err(|e| BlockchainError::Artifact(format!("invalid artifact: {}", e)))?;
        let bytecode = match raw.bytecode {
            RawBytecode::Hex(code) | RawBytecode::Object { object: code } => code,
        };
        if bytecode.is_empty() {
            return Err(BlockchainError::Artifact(
                "artifact has no creation bytecode (abstract contract or interface?)".to_string(),
            ));
        }
        Ok(Self {
            abi: raw.abi,
            bytecode,
        })
    }

    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    /// Creation bytecode followed by the ABI-encoded constructor arguments.
    pub fn encode_deploy(&self, args: &[DynSolValue]) -> BlockchainResult<Bytes> {
        let mut code = self.bytecode.to_vec();
        match &self.abi.constructor {
            Some(constructor) => {
                let encoded = constructor
                    .abi_encode_input(args)
                    .map_err(|e| BlockchainError::Abi(format!("constructor: {}", e)))?;
                code.extend_from_slice(&encoded);
            }
            None if !args.is_empty() => {
                return Err(BlockchainError::Abi(format!(
                    "constructor takes no arguments, got {}",
                    args.len()
                )));
            }
            None => {}
        }
        Ok(code.into())
    }

    /// Selector plus ABI-encoded arguments.
    pub fn encode_call(&self, method: &str, args: &[DynSolValue]) -> BlockchainResult<Bytes> {
        let function = self.function(method)?;
        function
            .abi_encode_input(args)
            .map(Bytes::from)
            .map_err(|e| BlockchainError::Abi(format!("{}: {}", method, e)))
    }

    /// Decode return data. A single output is returned bare, several as a tuple.
    pub fn decode_output(&self, method: &str, data: &[u8]) -> BlockchainResult<DynSolValue> {
        let function = self.function(method)?;
        let mut values = function
            .abi_decode_output(data)
            .map_err(|e| BlockchainError::Abi(format!("{}: {}", method, e)))?;
        Ok(if values.len() == 1 {
            values.remove(0)
        } else {
            DynSolValue::Tuple(values)
        })
    }

    /// Parse string arguments against the constructor's parameter types.
    pub fn constructor_args(&self, raw: &[String]) -> BlockchainResult<Vec<DynSolValue>> {
        let inputs = self
            .abi
            .constructor
            .as_ref()
            .map(|c| c.inputs.as_slice())
            .unwrap_or_default();
        coerce_args("constructor", inputs, raw)
    }

    /// Parse string arguments against a method's parameter types.
    pub fn method_args(&self, method: &str, raw: &[String]) -> BlockchainResult<Vec<DynSolValue>> {
        let function = self.function(method)?;
        coerce_args(method, &function.inputs, raw)
    }

    fn function(&self, method: &str) -> BlockchainResult<&Function> {
        self.abi
            .function(method)
            .and_then(|overloads| overloads.first())
            .ok_or_else(|| BlockchainError::Abi(format!("no function named '{}' in ABI", method)))
    }
}

fn coerce_args(context: &str, params: &[Param], raw: &[String]) -> BlockchainResult<Vec<DynSolValue>> {
    if params.len() != raw.len() {
        return Err(BlockchainError::Abi(format!(
            "{} expects {} argument(s), got {}",
            context,
            params.len(),
            raw.len()
        )));
    }

    params
        .iter()
        .zip(raw)
        .map(|(param, value)| {
            let ty: DynSolType = param
                .resolve()
                .map_err(|e| BlockchainError::Abi(format!("{}: {}", context, e)))?;
            ty.coerce_str(value).map_err(|e| {
                BlockchainError::Abi(format!("{} argument '{}': {}", context, param.name, e))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREETER: &str = r#"{
        "contractName": "Greeter",
        "abi": [
            {"type": "constructor", "stateMutability": "nonpayable",
             "inputs": [{"name": "_greeting", "type": "string", "internalType": "string"}]},
            {"type": "function", "name": "greet", "stateMutability": "view", "inputs": [],
             "outputs": [{"name": "", "type": "string", "internalType": "string"}]},
            {"type": "function", "name": "setGreeting", "stateMutability": "nonpayable",
             "inputs": [{"name": "_greeting", "type": "string", "internalType": "string"}],
             "outputs": []}
        ],
        "bytecode": "0x6080604052"
    }"#;

    #[test]
    fn test_hardhat_artifact() {
        let artifact = ContractArtifact::from_json(GREETER).unwrap();
        assert!(artifact.abi().function("greet").is_some());

        let args = artifact
            .constructor_args(&["Hello, Hardhat!".to_string()])
            .unwrap();
        assert_eq!(args, vec![DynSolValue::String("Hello, Hardhat!".to_string())]);

        let code = artifact.encode_deploy(&args).unwrap();
        assert!(code.starts_with(&[0x60, 0x80, 0x60, 0x40, 0x52]));
        // bytecode + offset word + length word + one padded data word
        assert_eq!(code.len(), 5 + 32 * 3);
    }

    #[test]
    fn test_foundry_bytecode_object() {
        let json = r#"{"abi": [], "bytecode": {"object": "0x6080"}}"#;
        let artifact = ContractArtifact::from_json(json).unwrap();
        assert_eq!(artifact.encode_deploy(&[]).unwrap(), Bytes::from_static(&[0x60, 0x80]));
    }

    #[test]
    fn test_empty_bytecode_rejected() {
        let json = r#"{"abi": [], "bytecode": "0x"}"#;
        assert!(matches!(
            ContractArtifact::from_json(json),
            Err(BlockchainError::Artifact(_))
        ));
    }

    #[test]
    fn test_call_round_trip_through_abi() {
        let artifact = ContractArtifact::from_json(GREETER).unwrap();

        let input = artifact
            .encode_call("setGreeting", &[DynSolValue::String("hi".to_string())])
            .unwrap();
        // keccak256("setGreeting(string)")[..4]
        assert_eq!(&input[..4], &[0xa4, 0x13, 0x68, 0x62]);

        let output = DynSolValue::Tuple(vec![DynSolValue::String("hi".to_string())]).abi_encode_params();
        let value = artifact.decode_output("greet", &output).unwrap();
        assert_eq!(value.as_str(), Some("hi"));
    }

    #[test]
    fn test_argument_count_checked() {
        let artifact = ContractArtifact::from_json(GREETER).unwrap();
        let err = artifact.method_args("setGreeting", &[]).unwrap_err();
        assert!(err.to_string().contains("expects 1 argument(s), got 0"));

        let err = artifact.encode_call("missing", &[]).unwrap_err();
        assert!(err.to_string().contains("no function named 'missing'"));
    }
}
