//! Client driver.
//!
//! Registers with the server, pumps the startup listing (locations,
//! channels, relations, scenes) with `CS_GET_NEXT` and offers typed
//! wrappers for the common client requests. Unsolicited value packs that
//! arrive while waiting for a reply are stashed and can be drained with
//! [`Client::take_value_updates`].

use supla_proto::{
    packets::Packet,
    records::{
        client::{
            Action, ActionExecutionResult, ChannelPackE, ChannelRelationPack, ChannelValuePackB,
            LocationPack, NewValue, RegisterClientD, RegisterClientResultD, ScenePack,
        },
        ActionSubjectType, ActionType, ChannelValue, ResultCode, Target,
    },
    Call, Codec, AUTHKEY_SIZE, GUID_SIZE,
};

use crate::{error::ClientError, transport, ClientStream};

/// Identity and connection settings of a client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server hostname.
    pub host: String,
    /// Server port (plain or TLS, per `secure`).
    pub port: u16,
    /// Connect over TLS.
    pub secure: bool,
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
    /// Client name.
    pub name: String,
    /// Client software version.
    pub version: String,
    /// Client GUID.
    pub guid: [u8; GUID_SIZE],
    /// Shared authentication blob.
    pub authkey: [u8; AUTHKEY_SIZE],
}

impl ClientConfig {
    /// Settings for a local plain-TCP client.
    pub fn new(host: impl Into<String>, port: u16, name: impl Into<String>) -> Self {
        let name = name.into();
        // derive a stable guid from the name so reconnects reuse the id
        let mut guid = [0u8; GUID_SIZE];
        for (i, byte) in name.bytes().enumerate() {
            guid[i % GUID_SIZE] = guid[i % GUID_SIZE].wrapping_add(byte).wrapping_add(i as u8);
        }
        guid[0] |= 1;
        Self {
            host: host.into(),
            port,
            secure: false,
            email: "email@email.com".to_owned(),
            password: "password123".to_owned(),
            name,
            version: "1.2.3".to_owned(),
            guid,
            authkey: [0; AUTHKEY_SIZE],
        }
    }
}

/// A registered client with the startup listing already pumped.
pub struct Client {
    /// The underlying packet stream.
    pub stream: ClientStream,
    /// Client id assigned by the server.
    pub client_id: i32,
    /// Full registration result.
    pub result: RegisterClientResultD,
    /// The location listing.
    pub location_pack: LocationPack,
    /// The channel listing, one pack per batch.
    pub channel_packs: Vec<ChannelPackE>,
    /// The channel relation listing.
    pub relation_pack: ChannelRelationPack,
    /// The scene listing.
    pub scene_pack: ScenePack,
    value_updates: Vec<ChannelValuePackB>,
}

impl Client {
    /// Connect, register and pump the startup listing.
    pub async fn register(config: ClientConfig) -> Result<Self, ClientError> {
        let mut stream = transport::connect(&config.host, config.port, config.secure).await?;

        let register = RegisterClientD {
            email: config.email.clone(),
            password: config.password.clone(),
            guid: config.guid,
            authkey: config.authkey,
            name: config.name.clone(),
            soft_ver: config.version.clone(),
            server_name: config.host.clone(),
        };
        stream.send(&Packet::new(Call::CsRegisterClientD, register.encode()?)).await?;

        let packet = stream.recv().await?;
        if packet.call_id != Call::ScRegisterClientResultD {
            return Err(ClientError::UnexpectedCall(packet.call_id));
        }
        let (result, _) = RegisterClientResultD::decode(&packet.data)?;
        if result.result_code != ResultCode::True {
            return Err(ClientError::Rejected(result.result_code));
        }

        // locations are pushed without a pump
        let packet = stream.recv().await?;
        if packet.call_id != Call::ScLocationPackUpdate {
            return Err(ClientError::UnexpectedCall(packet.call_id));
        }
        let (location_pack, _) = LocationPack::decode(&packet.data)?;

        // channel batches until none are left
        let mut channel_packs = Vec::new();
        loop {
            stream.send(&Packet::bare(Call::CsGetNext)).await?;
            let packet = stream.recv().await?;
            if packet.call_id != Call::ScChannelPackUpdateE {
                return Err(ClientError::UnexpectedCall(packet.call_id));
            }
            let (pack, _) = ChannelPackE::decode(&packet.data)?;
            let done = pack.total_left == 0;
            channel_packs.push(pack);
            if done {
                break;
            }
        }

        stream.send(&Packet::bare(Call::CsGetNext)).await?;
        let packet = stream.recv().await?;
        if packet.call_id != Call::ScChannelRelationPackUpdate {
            return Err(ClientError::UnexpectedCall(packet.call_id));
        }
        let (relation_pack, _) = ChannelRelationPack::decode(&packet.data)?;

        stream.send(&Packet::bare(Call::CsGetNext)).await?;
        let packet = stream.recv().await?;
        if packet.call_id != Call::ScScenePackUpdate {
            return Err(ClientError::UnexpectedCall(packet.call_id));
        }
        let (scene_pack, _) = ScenePack::decode(&packet.data)?;

        Ok(Self {
            stream,
            client_id: result.client_id,
            result,
            location_pack,
            channel_packs,
            relation_pack,
            scene_pack,
            value_updates: Vec::new(),
        })
    }

    /// Receive the next packet.
    pub async fn recv(&mut self) -> Result<Packet, ClientError> {
        Ok(self.stream.recv().await?)
    }

    /// Send a raw packet.
    pub async fn send(&self, packet: &Packet) -> Result<(), ClientError> {
        Ok(self.stream.send(packet).await?)
    }

    /// Receive the next channel-value pack, skipping nothing else.
    pub async fn recv_value_pack(&mut self) -> Result<ChannelValuePackB, ClientError> {
        if !self.value_updates.is_empty() {
            return Ok(self.value_updates.remove(0));
        }
        let packet = self.stream.recv().await?;
        if packet.call_id != Call::ScChannelValuePackUpdateB {
            return Err(ClientError::UnexpectedCall(packet.call_id));
        }
        Ok(ChannelValuePackB::decode(&packet.data)?.0)
    }

    /// Value packs that arrived while waiting for a typed reply.
    pub fn take_value_updates(&mut self) -> Vec<ChannelValuePackB> {
        std::mem::take(&mut self.value_updates)
    }

    /// Wait for a specific reply, stashing value packs on the way.
    async fn recv_reply(&mut self, call: Call) -> Result<Packet, ClientError> {
        loop {
            let packet = self.stream.recv().await?;
            if packet.call_id == call {
                return Ok(packet);
            }
            if packet.call_id == Call::ScChannelValuePackUpdateB {
                self.value_updates.push(ChannelValuePackB::decode(&packet.data)?.0);
                continue;
            }
            return Err(ClientError::UnexpectedCall(packet.call_id));
        }
    }

    /// Execute an action on a channel or scene.
    pub async fn execute_action(
        &mut self,
        action_id: ActionType,
        subject_id: i32,
        subject_type: ActionSubjectType,
    ) -> Result<ActionExecutionResult, ClientError> {
        let action = Action { action_id, subject_id, subject_type, param: vec![] };
        self.stream.send(&Packet::new(Call::CsExecuteAction, action.encode()?)).await?;
        let packet = self.recv_reply(Call::ScActionExecutionResult).await?;
        Ok(ActionExecutionResult::decode(&packet.data)?.0)
    }

    /// Write a raw channel value.
    pub async fn set_value(
        &mut self,
        channel_id: i32,
        value: ChannelValue,
    ) -> Result<(), ClientError> {
        let msg = NewValue { value_id: channel_id, target: Target::Channel, value };
        self.stream.send(&Packet::new(Call::CsSetValue, msg.encode()?)).await?;
        Ok(())
    }
}
