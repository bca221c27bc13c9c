//! Message framing shared by host and channel.
//!
//! Every request starts with an `i32` message type. Responses to invocations
//! start with one of the result types. Parameter payloads follow either in
//! the clear or, once a session is established, as `i32 len + sealed bytes`.

use crate::core::codec::{encode_to_vec, put_len_prefixed, CompressionPolicy};
use crate::core::reader::WireRead;
use crate::core::serialization::TypeResolver;
use crate::core::value::Value;
use crate::error::{ProtocolError, Result};
use crate::utils::crypto::Crypto;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum MessageType {
    ZkInitiate = 1,
    ZkProof = 2,
    SyncInterface = 3,
    MethodInvocation = 4,
    TerminateConnection = 5,
    ReturnValues = 6,
    ThrowException = 7,
    UnknownMethod = 8,
}

impl MessageType {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn to_le_bytes(self) -> [u8; 4] {
        self.as_i32().to_le_bytes()
    }
}

impl TryFrom<i32> for MessageType {
    type Error = ProtocolError;

    fn try_from(value: i32) -> Result<Self> {
        Ok(match value {
            1 => MessageType::ZkInitiate,
            2 => MessageType::ZkProof,
            3 => MessageType::SyncInterface,
            4 => MessageType::MethodInvocation,
            5 => MessageType::TerminateConnection,
            6 => MessageType::ReturnValues,
            7 => MessageType::ThrowException,
            8 => MessageType::UnknownMethod,
            other => return Err(ProtocolError::UnexpectedMessage(other)),
        })
    }
}

pub async fn read_message_type<R: WireRead + ?Sized>(reader: &mut R) -> Result<MessageType> {
    MessageType::try_from(reader.read_i32_le().await?)
}

/// Outcome categories of a method invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    ReturnValues,
    ThrowException,
    UnknownMethod,
}

impl From<ResultKind> for MessageType {
    fn from(kind: ResultKind) -> Self {
        match kind {
            ResultKind::ReturnValues => MessageType::ReturnValues,
            ResultKind::ThrowException => MessageType::ThrowException,
            ResultKind::UnknownMethod => MessageType::UnknownMethod,
        }
    }
}

/// A failure raised by a remote method, carried back to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFault {
    pub type_name: String,
    pub message: String,
    pub stack: Option<String>,
}

impl RemoteFault {
    /// Wire form: `[String type_name, String message, String|Null stack]`
    pub fn to_values(&self) -> Vec<Value> {
        vec![
            Value::String(self.type_name.clone()),
            Value::String(self.message.clone()),
            self.stack.clone().map(Value::String).unwrap_or(Value::Null),
        ]
    }

    pub fn from_values(values: Vec<Value>) -> Result<Self> {
        let mut iter = values.into_iter();
        let type_name = match iter.next() {
            Some(Value::String(s)) => s,
            _ => return Err(ProtocolError::malformed("Exception payload lacks a type name")),
        };
        let message = match iter.next() {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => String::new(),
            _ => return Err(ProtocolError::malformed("Exception message is not a string")),
        };
        let stack = match iter.next() {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        Ok(Self {
            type_name,
            message,
            stack,
        })
    }
}

impl From<RemoteFault> for ProtocolError {
    fn from(fault: RemoteFault) -> Self {
        ProtocolError::RemoteInvocationFailed {
            type_name: fault.type_name,
            message: fault.message,
            stack: fault.stack,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodCallEnvelope {
    pub service_key_index: i32,
    pub method_id: i32,
    pub parameters: Vec<Value>,
}

/// What a host sends back for one invocation.
///
/// `Returned` holds the return value in slot 0 followed by one slot per
/// argument: by-ref arguments carry their updated value, all others Null.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    Returned(Vec<Value>),
    Faulted(RemoteFault),
    UnknownMethod,
}

impl InvocationResult {
    pub fn kind(&self) -> ResultKind {
        match self {
            InvocationResult::Returned(_) => ResultKind::ReturnValues,
            InvocationResult::Faulted(_) => ResultKind::ThrowException,
            InvocationResult::UnknownMethod => ResultKind::UnknownMethod,
        }
    }
}

/// Either clear text or an established session's cipher
#[derive(Clone, Copy)]
pub enum Payload<'a> {
    Clear,
    Sealed(&'a Crypto),
}

impl Payload<'_> {
    pub fn from_session(session: Option<&Crypto>) -> Payload<'_> {
        match session {
            Some(crypto) => Payload::Sealed(crypto),
            None => Payload::Clear,
        }
    }

    /// Append an encoded parameter list, sealing it when a session exists
    pub fn put_parameters(self, out: &mut Vec<u8>, values: &[Value], policy: CompressionPolicy) -> Result<()> {
        match self {
            Payload::Clear => crate::core::codec::encode_parameters(values, policy, out),
            Payload::Sealed(crypto) => {
                let plain = encode_to_vec(values, policy)?;
                put_len_prefixed(out, &crypto.seal(&plain)?)
            }
        }
    }

    pub async fn read_parameters<R: WireRead + ?Sized>(
        self,
        reader: &mut R,
        resolver: &dyn TypeResolver,
    ) -> Result<Vec<Value>> {
        match self {
            Payload::Clear => crate::core::codec::decode_parameters(reader, resolver).await,
            Payload::Sealed(crypto) => {
                let sealed = reader.read_len_prefixed().await?;
                let plain = crypto.open(&sealed)?;
                crate::core::codec::decode_from_slice(plain, resolver).await
            }
        }
    }

    /// Append a block that is opaque to the codec (service keys, sync info)
    pub fn put_block(self, out: &mut Vec<u8>, data: &[u8]) -> Result<()> {
        match self {
            Payload::Clear => put_len_prefixed(out, data),
            Payload::Sealed(crypto) => put_len_prefixed(out, &crypto.seal(data)?),
        }
    }

    pub fn open_block(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Payload::Clear => Ok(data.to_vec()),
            Payload::Sealed(crypto) => crypto.open(data),
        }
    }
}

/// Read the body of a `MethodInvocation` request.
///
/// The parameter list is always consumed, even when the key index or method
/// id turn out to be unknown, so the connection stays aligned.
pub async fn read_invocation<R: WireRead + ?Sized>(
    reader: &mut R,
    payload: Payload<'_>,
    resolver: &dyn TypeResolver,
) -> Result<MethodCallEnvelope> {
    let service_key_index = reader.read_i32_le().await?;
    let method_id = reader.read_i32_le().await?;
    let parameters = payload.read_parameters(reader, resolver).await?;
    Ok(MethodCallEnvelope {
        service_key_index,
        method_id,
        parameters,
    })
}

/// Encode a `MethodInvocation` request including its message type
pub fn write_invocation(
    out: &mut Vec<u8>,
    envelope: &MethodCallEnvelope,
    payload: Payload<'_>,
    policy: CompressionPolicy,
) -> Result<()> {
    out.extend_from_slice(&MessageType::MethodInvocation.to_le_bytes());
    out.extend_from_slice(&envelope.service_key_index.to_le_bytes());
    out.extend_from_slice(&envelope.method_id.to_le_bytes());
    payload.put_parameters(out, &envelope.parameters, policy)
}
