//! Integration tests driving a real server over UDP
//!
//! Each test starts its own server on an ephemeral port with handshake
//! pacing disabled and the stats loops slowed down, so the only packets a
//! client sees are the ones its own requests cause.

use server::config::ServerConfig;
use server::game::Game;
use server::network::Server;
use shared::catalog::item_ids;
use shared::protocol::{Packet, PacketType};
use shared::{Catalog, Vec3};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

async fn start_server() -> (SocketAddr, Game) {
    let config = ServerConfig {
        stats_tick: Duration::from_secs(600),
        stats_sync: Duration::from_secs(600),
        ..ServerConfig::default()
    }
    .without_sync_delays();

    let mut server = Server::new("127.0.0.1:0", config, Catalog::builtin())
        .await
        .expect("Failed to start server");
    let addr = server.local_addr().unwrap();
    let game = server.game();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    (addr, game)
}

struct TestClient {
    socket: UdpSocket,
}

impl TestClient {
    async fn new(server: SocketAddr) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind client socket");
        socket.connect(server).await.unwrap();
        Self { socket }
    }

    /// Connects and completes the full handshake
    async fn join(server: SocketAddr, name: &str) -> (Self, u32) {
        let client = Self::new(server).await;
        let player_id = client.connect(name).await;
        client.send(Packet::ClientReady).await;
        client
            .recv_matching(|p| matches!(p, Packet::StatsUpdate { .. }))
            .await;
        (client, player_id)
    }

    async fn connect(&self, name: &str) -> u32 {
        self.send(Packet::ConnectionRequest {
            player_name: name.to_string(),
        })
        .await;
        match self.recv().await {
            Packet::ConnectionAccept { player_id, .. } => player_id,
            other => panic!("Expected ConnectionAccept, got {:?}", other),
        }
    }

    async fn send(&self, packet: Packet) {
        self.socket.send(&packet.encode()).await.unwrap();
    }

    async fn send_raw(&self, bytes: &[u8]) {
        self.socket.send(bytes).await.unwrap();
    }

    async fn recv(&self) -> Packet {
        let mut buf = [0u8; 4096];
        let len = timeout(RECV_TIMEOUT, self.socket.recv(&mut buf))
            .await
            .expect("Timed out waiting for server")
            .unwrap();
        Packet::decode(&buf[..len]).expect("Server sent an undecodable packet")
    }

    /// Skips packets until one matches
    async fn recv_matching<F>(&self, predicate: F) -> Packet
    where
        F: Fn(&Packet) -> bool,
    {
        loop {
            let packet = self.recv().await;
            if predicate(&packet) {
                return packet;
            }
        }
    }
}

/// HANDSHAKE TESTS
mod handshake_tests {
    use super::*;

    #[tokio::test]
    async fn first_player_gets_id_one_at_spawn() {
        let (server, _) = start_server().await;
        let client = TestClient::new(server).await;

        client
            .send(Packet::ConnectionRequest {
                player_name: "Ana".to_string(),
            })
            .await;

        assert_eq!(
            client.recv().await,
            Packet::ConnectionAccept {
                player_id: 1,
                spawn: Vec3::new(0.0, 1.0, 0.0)
            }
        );
    }

    #[tokio::test]
    async fn ready_streams_snapshot_in_order() {
        let (server, _) = start_server().await;
        let client = TestClient::new(server).await;
        client.connect("Ana").await;

        client.send(Packet::ClientReady).await;

        let order: Vec<PacketType> = [
            client.recv().await,
            client.recv().await,
            client.recv().await,
            client.recv().await,
        ]
        .iter()
        .map(Packet::packet_type)
        .collect();

        assert_eq!(
            order,
            vec![
                PacketType::InventoryUpdate,
                PacketType::ResourcesSync,
                PacketType::RecipesSync,
                PacketType::StatsUpdate,
            ]
        );
    }

    #[tokio::test]
    async fn snapshot_contents() {
        let (server, _) = start_server().await;
        let client = TestClient::new(server).await;
        client.connect("Ana").await;
        client.send(Packet::ClientReady).await;

        match client.recv().await {
            Packet::InventoryUpdate { slots } => {
                assert_eq!(slots.len(), 3);
                assert_eq!(slots[0].item_id, item_ids::APPLE);
                assert_eq!(slots[0].quantity, 5);
            }
            other => panic!("Expected inventory, got {:?}", other),
        }
        match client.recv().await {
            Packet::ResourcesSync { resources } => assert_eq!(resources.len(), 49),
            other => panic!("Expected resources, got {:?}", other),
        }
        match client.recv().await {
            Packet::RecipesSync { recipes } => {
                let ids: Vec<u32> = recipes.iter().map(|r| r.id).collect();
                assert_eq!(ids, vec![1, 2, 3, 4]);
            }
            other => panic!("Expected recipes, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn others_see_new_player_spawn() {
        let (server, _) = start_server().await;
        let (ana, _) = TestClient::join(server, "Ana").await;

        let bob = TestClient::new(server).await;
        let bob_id = bob.connect("Bob").await;
        bob.send(Packet::ClientReady).await;

        // Bob's roster contains Ana before the resource snapshot
        bob.recv_matching(|p| matches!(p, Packet::InventoryUpdate { .. }))
            .await;
        match bob.recv().await {
            Packet::PlayerSpawn { player_name, .. } => assert_eq!(player_name, "Ana"),
            other => panic!("Expected Ana's spawn, got {:?}", other),
        }

        let spawn = ana
            .recv_matching(|p| matches!(p, Packet::PlayerSpawn { .. }))
            .await;
        assert_eq!(
            spawn,
            Packet::PlayerSpawn {
                player_id: bob_id,
                player_name: "Bob".to_string(),
                position: Vec3::new(0.0, 1.0, 0.0),
            }
        );
    }

    #[tokio::test]
    async fn logout_is_broadcast() {
        let (server, game) = start_server().await;
        let (ana, _) = TestClient::join(server, "Ana").await;
        let (bob, bob_id) = TestClient::join(server, "Bob").await;

        bob.send(Packet::PlayerDisconnect { player_id: bob_id })
            .await;

        let packet = ana
            .recv_matching(|p| matches!(p, Packet::PlayerDisconnect { .. }))
            .await;
        assert_eq!(packet, Packet::PlayerDisconnect { player_id: bob_id });
        assert_eq!(game.player_count().await, 1);
    }

    #[tokio::test]
    async fn malformed_datagrams_do_not_break_session() {
        let (server, _) = start_server().await;
        let (client, _) = TestClient::join(server, "Ana").await;

        client.send_raw(&[1, 2, 3]).await;
        client.send_raw(&[15, 100, 0, 0, 0, 1]).await;
        client.send_raw(&[250, 0, 0, 0, 0]).await;

        client
            .send(Packet::ItemMove {
                from_slot: 0,
                to_slot: 5,
            })
            .await;
        match client.recv().await {
            Packet::InventoryUpdate { slots } => {
                assert!(slots.iter().any(|s| s.slot == 5 && s.item_id == item_ids::APPLE));
            }
            other => panic!("Expected inventory, got {:?}", other),
        }
    }
}

/// GAMEPLAY TESTS
mod gameplay_tests {
    use super::*;

    fn hit(resource_id: u32, damage: f32) -> Packet {
        Packet::ResourceHit {
            resource_id,
            damage,
            tool_type: 0,
        }
    }

    #[tokio::test]
    async fn eating_at_full_hunger_is_rejected() {
        let (server, _) = start_server().await;
        let (client, _) = TestClient::join(server, "Ana").await;

        client.send(Packet::ItemUse { slot: 0 }).await;
        client
            .send(Packet::ItemMove {
                from_slot: 0,
                to_slot: 10,
            })
            .await;

        // The very next packet answers the move; the rejected use sent nothing
        match client.recv().await {
            Packet::InventoryUpdate { slots } => {
                let apples = slots.iter().find(|s| s.slot == 10).unwrap();
                assert_eq!(apples.item_id, item_ids::APPLE);
                assert_eq!(apples.quantity, 5);
            }
            other => panic!("Expected inventory, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn concurrent_gathering_on_one_tree() {
        let (server, game) = start_server().await;
        let (ana, _) = TestClient::join(server, "Ana").await;
        let (bob, _) = TestClient::join(server, "Bob").await;

        tokio::join!(ana.send(hit(1, 20.0)), bob.send(hit(1, 30.0)));

        let ana_result = ana
            .recv_matching(|p| matches!(p, Packet::GatherResult { .. }))
            .await;
        let bob_result = bob
            .recv_matching(|p| matches!(p, Packet::GatherResult { .. }))
            .await;
        assert!(matches!(ana_result, Packet::GatherResult { wood: 20, .. }));
        assert!(matches!(bob_result, Packet::GatherResult { wood: 30, .. }));

        let settled = ana
            .recv_matching(|p| matches!(p, Packet::ResourceUpdate { health, .. } if *health == 50.0))
            .await;
        assert_eq!(
            settled,
            Packet::ResourceUpdate {
                resource_id: 1,
                health: 50.0,
                max_health: 100.0
            }
        );
        assert_eq!(game.resource_health(1).await, Some(50.0));
    }

    #[tokio::test]
    async fn destroying_a_tree_is_broadcast() {
        let (server, _) = start_server().await;
        let (ana, _) = TestClient::join(server, "Ana").await;
        let (bob, _) = TestClient::join(server, "Bob").await;

        ana.send(hit(2, 50.0)).await;
        ana.send(hit(2, 50.0)).await;

        let destroyed = bob
            .recv_matching(|p| matches!(p, Packet::ResourceDestroyed { .. }))
            .await;
        assert_eq!(destroyed, Packet::ResourceDestroyed { resource_id: 2 });
    }

    #[tokio::test]
    async fn craft_and_cancel_round_trip() {
        let (server, _) = start_server().await;
        let (client, _) = TestClient::join(server, "Ana").await;

        // Two full hits on a tree give exactly one campfire's worth of wood
        client.send(hit(3, 50.0)).await;
        client.send(hit(3, 50.0)).await;
        for _ in 0..2 {
            client
                .recv_matching(|p| matches!(p, Packet::GatherResult { .. }))
                .await;
        }

        client.send(Packet::CraftRequest { recipe_id: 3 }).await;
        match client
            .recv_matching(|p| matches!(p, Packet::CraftStarted { .. }))
            .await
        {
            Packet::CraftStarted {
                recipe_id,
                duration,
                success,
                ..
            } => {
                assert_eq!(recipe_id, 3);
                assert_eq!(duration, 5.0);
                assert!(success);
            }
            _ => unreachable!(),
        }
        let queue = client
            .recv_matching(|p| matches!(p, Packet::CraftQueueUpdate { .. }))
            .await;
        assert!(matches!(queue, Packet::CraftQueueUpdate { entries } if entries.len() == 1));

        client.send(Packet::CraftCancel { queue_index: 0 }).await;
        match client
            .recv_matching(|p| matches!(p, Packet::InventoryUpdate { .. }))
            .await
        {
            Packet::InventoryUpdate { slots } => {
                let wood: u32 = slots
                    .iter()
                    .filter(|s| s.item_id == item_ids::WOOD)
                    .map(|s| s.quantity)
                    .sum();
                assert_eq!(wood, 100);
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn craft_without_ingredients_fails_with_reason() {
        let (server, _) = start_server().await;
        let (client, _) = TestClient::join(server, "Ana").await;

        client.send(Packet::CraftRequest { recipe_id: 1 }).await;

        match client.recv().await {
            Packet::CraftStarted {
                success, message, ..
            } => {
                assert!(!success);
                assert!(message.starts_with("Not enough Wood"));
            }
            other => panic!("Expected CraftStarted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn movement_is_relayed_to_others() {
        let (server, _) = start_server().await;
        let (ana, ana_id) = TestClient::join(server, "Ana").await;
        let (bob, _) = TestClient::join(server, "Bob").await;

        ana.send(Packet::PlayerMovement {
            player_id: 999,
            position: Vec3::new(5.0, 1.0, -3.0),
            rotation: shared::Vec2::new(90.0, 10.0),
        })
        .await;

        let moved = bob
            .recv_matching(|p| matches!(p, Packet::PlayerMovement { .. }))
            .await;
        match moved {
            Packet::PlayerMovement {
                player_id,
                position,
                ..
            } => {
                // The server stamps the sender's real id
                assert_eq!(player_id, ana_id);
                assert_eq!(position, Vec3::new(5.0, 1.0, -3.0));
            }
            _ => unreachable!(),
        }
    }
}
