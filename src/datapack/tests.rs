//! Datapack Module Tests
//!
//! Exercises disposal policy parsing and the filesystem end states each
//! policy must leave behind.
//!
//! ## Test Scopes
//! - **Parsing**: case-insensitive names, single-letter abbreviations, and
//!   rejection of unknown policies.
//! - **Staging**: materialization writes files and creates parent directories.
//! - **Disposal**: per-policy filesystem outcomes and return packets.

#[cfg(test)]
mod tests {
    use crate::datapack::packet::{DataPack, DataPacket};
    use crate::datapack::types::{Disposal, RelayConfig};
    use crate::request::types::RequestId;
    use std::path::Path;
    use std::time::Duration;

    const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

    fn test_id() -> RequestId {
        // Fixed timestamp keeps id equality deterministic across calls
        RequestId {
            submitter: "tester".to_string(),
            sequence: 1,
            created_at: 1234,
        }
    }

    // ============================================================
    // TEST 1: Disposal parsing
    // ============================================================

    #[test]
    fn test_disposal_parses_full_names_case_insensitively() {
        assert_eq!("DELETE".parse::<Disposal>().unwrap(), Disposal::Delete);
        assert_eq!("keep".parse::<Disposal>().unwrap(), Disposal::Keep);
        assert_eq!("Return".parse::<Disposal>().unwrap(), Disposal::Return);
        assert_eq!("ftp".parse::<Disposal>().unwrap(), Disposal::Ftp);
        assert_eq!("uPdAtE".parse::<Disposal>().unwrap(), Disposal::Update);
    }

    #[test]
    fn test_disposal_parses_single_letter_abbreviations() {
        assert_eq!("d".parse::<Disposal>().unwrap(), Disposal::Delete);
        assert_eq!("k".parse::<Disposal>().unwrap(), Disposal::Keep);
        assert_eq!("r".parse::<Disposal>().unwrap(), Disposal::Return);
        assert_eq!("f".parse::<Disposal>().unwrap(), Disposal::Ftp);
        assert_eq!("U".parse::<Disposal>().unwrap(), Disposal::Update);
    }

    #[test]
    fn test_disposal_rejects_unknown_policy() {
        let result = "shred".parse::<Disposal>();
        assert!(result.is_err(), "unknown policies must fail, never default");
    }

    // ============================================================
    // TEST 2: Materialization
    // ============================================================

    #[tokio::test]
    async fn test_materialize_writes_file_and_creates_parents() {
        let staging = tempfile::tempdir().unwrap();
        let mut packet = DataPacket::file("in.dat", "deep/nested/in.dat", Disposal::Keep, b"abc".to_vec());

        packet.materialize(staging.path(), FETCH_TIMEOUT).await.unwrap();

        let resolved = Path::new(packet.server_path());
        assert!(resolved.is_absolute(), "server path is resolved by materialize");
        assert_eq!(std::fs::read(resolved).unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_materialize_return_packet_is_a_no_op() {
        let staging = tempfile::tempdir().unwrap();
        let mut packet = DataPacket::reference("out.dat", "out.dat", Disposal::Return);

        packet.materialize(staging.path(), FETCH_TIMEOUT).await.unwrap();

        // The path is resolved but nothing is written
        assert!(!Path::new(packet.server_path()).exists());
    }

    #[tokio::test]
    async fn test_materialize_fails_loudly_when_directory_creation_fails() {
        let staging = tempfile::tempdir().unwrap();
        // Occupy the parent-directory name with a plain file
        let blocker = staging.path().join("blocked");
        std::fs::write(&blocker, b"x").unwrap();

        let mut packet =
            DataPacket::file("in.dat", "blocked/in.dat", Disposal::Keep, b"abc".to_vec());
        let result = packet.materialize(staging.path(), FETCH_TIMEOUT).await;

        let err = result.expect_err("directory creation failure must surface");
        assert!(err.to_string().contains("staging directory"));
    }

    #[tokio::test]
    async fn test_materialize_without_body_fails() {
        let staging = tempfile::tempdir().unwrap();
        let mut packet = DataPacket::reference("in.dat", "in.dat", Disposal::Keep);

        let result = packet.materialize(staging.path(), FETCH_TIMEOUT).await;
        assert!(result.is_err());
    }

    // ============================================================
    // TEST 3: Disposal end states
    // ============================================================

    #[tokio::test]
    async fn test_delete_removes_file_without_return_packet() {
        let staging = tempfile::tempdir().unwrap();
        let mut packet = DataPacket::file("in.dat", "in.dat", Disposal::Delete, b"abc".to_vec());
        packet.materialize(staging.path(), FETCH_TIMEOUT).await.unwrap();
        let staged = packet.server_path().to_string();

        let produced = packet.dispose(None).await.unwrap();

        assert!(produced.is_none());
        assert!(!Path::new(&staged).exists());
    }

    #[tokio::test]
    async fn test_keep_leaves_file_without_return_packet() {
        let staging = tempfile::tempdir().unwrap();
        let mut packet = DataPacket::file("in.dat", "in.dat", Disposal::Keep, b"abc".to_vec());
        packet.materialize(staging.path(), FETCH_TIMEOUT).await.unwrap();

        let produced = packet.dispose(None).await.unwrap();

        assert!(produced.is_none());
        assert!(Path::new(packet.server_path()).exists());
    }

    #[tokio::test]
    async fn test_update_yields_keep_packet_with_modified_bytes() {
        let staging = tempfile::tempdir().unwrap();
        let mut packet = DataPacket::file("in.dat", "in.dat", Disposal::Update, b"old".to_vec());
        packet.materialize(staging.path(), FETCH_TIMEOUT).await.unwrap();

        // The task modifies the staged file in place
        std::fs::write(packet.server_path(), b"new").unwrap();

        let produced = packet.dispose(None).await.unwrap().expect("return packet");
        match &produced {
            DataPacket::File {
                client_path,
                disposal,
                body,
                ..
            } => {
                assert_eq!(client_path, packet.server_path());
                assert_eq!(*disposal, Disposal::Keep);
                assert_eq!(body.as_deref(), Some(b"new".as_slice()));
            }
            other => panic!("expected a file packet, got {:?}", other),
        }
        // The worker-side copy survives update disposal
        assert!(Path::new(packet.server_path()).exists());
    }

    #[tokio::test]
    async fn test_return_always_yields_return_packet() {
        let staging = tempfile::tempdir().unwrap();
        let mut packet = DataPacket::reference("result.log", "result.log", Disposal::Return);
        packet.materialize(staging.path(), FETCH_TIMEOUT).await.unwrap();

        // The task produces the worker-side file named by the reference
        std::fs::write(packet.server_path(), b"produced").unwrap();

        let produced = packet.dispose(None).await.unwrap().expect("return packet");
        match produced {
            DataPacket::File {
                client_path, body, ..
            } => {
                assert_eq!(client_path, packet.server_path());
                assert_eq!(body.as_deref(), Some(b"produced".as_slice()));
            }
            other => panic!("expected a file packet, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ftp_relays_file_and_yields_url_packet() {
        let staging = tempfile::tempdir().unwrap();
        let relay_dir = tempfile::tempdir().unwrap();
        let relay = RelayConfig {
            dir: relay_dir.path().to_path_buf(),
            base_url: "http://relay.example/pub/".to_string(),
        };

        let mut packet = DataPacket::reference("big.out", "big.out", Disposal::Ftp);
        packet.materialize(staging.path(), FETCH_TIMEOUT).await.unwrap();
        std::fs::write(packet.server_path(), b"bulk").unwrap();

        let produced = packet.dispose(Some(&relay)).await.unwrap().expect("url packet");
        match produced {
            DataPacket::Url {
                source, disposal, ..
            } => {
                assert_eq!(source, "http://relay.example/pub/big.out");
                assert_eq!(disposal, Disposal::Keep);
            }
            other => panic!("expected a url packet, got {:?}", other),
        }

        // Relayed into the shared directory, removed from the staging area
        assert_eq!(
            std::fs::read(relay_dir.path().join("big.out")).unwrap(),
            b"bulk"
        );
        assert!(!Path::new(packet.server_path()).exists());
    }

    #[tokio::test]
    async fn test_ftp_without_relay_config_fails() {
        let staging = tempfile::tempdir().unwrap();
        let mut packet = DataPacket::reference("big.out", "big.out", Disposal::Ftp);
        packet.materialize(staging.path(), FETCH_TIMEOUT).await.unwrap();
        std::fs::write(packet.server_path(), b"bulk").unwrap();

        let result = packet.dispose(None).await;
        assert!(result.is_err());
    }

    // ============================================================
    // TEST 4: Pack-level behavior
    // ============================================================

    #[tokio::test]
    async fn test_pack_with_update_abbreviation_round_trip() {
        // Disposal arrives as the abbreviation "u" from user input
        let disposal: Disposal = "u".parse().unwrap();
        let staging = tempfile::tempdir().unwrap();

        let mut pack = DataPack::new(test_id());
        pack.push(DataPacket::file("data.sdf", "data.sdf", disposal, b"frames".to_vec()));
        pack.materialize(staging.path(), FETCH_TIMEOUT).await.unwrap();

        let produced = pack.dispose(None).await.unwrap().expect("return pack");
        assert_eq!(produced.id, test_id());
        assert_eq!(produced.packets.len(), 1);
        assert_eq!(produced.packets[0].disposal(), Disposal::Keep);
    }

    #[tokio::test]
    async fn test_pack_of_keep_packets_collapses_to_none() {
        let staging = tempfile::tempdir().unwrap();

        let mut pack = DataPack::new(test_id());
        pack.push(DataPacket::file("a.dat", "a.dat", Disposal::Keep, b"a".to_vec()));
        pack.push(DataPacket::file("b.dat", "b.dat", Disposal::Keep, b"b".to_vec()));
        pack.materialize(staging.path(), FETCH_TIMEOUT).await.unwrap();

        let produced = pack.dispose(None).await.unwrap();
        assert!(produced.is_none(), "no returns must collapse to None, not an empty pack");
    }

    #[tokio::test]
    async fn test_pack_preserves_member_order_in_returns() {
        let staging = tempfile::tempdir().unwrap();

        let mut pack = DataPack::new(test_id());
        pack.push(DataPacket::file("a.dat", "a.dat", Disposal::Update, b"a".to_vec()));
        pack.push(DataPacket::file("b.dat", "b.dat", Disposal::Keep, b"b".to_vec()));
        pack.push(DataPacket::file("c.dat", "c.dat", Disposal::Update, b"c".to_vec()));
        pack.materialize(staging.path(), FETCH_TIMEOUT).await.unwrap();

        let produced = pack.dispose(None).await.unwrap().expect("return pack");
        assert_eq!(produced.packets.len(), 2);
        assert!(produced.packets[0].server_path().ends_with("a.dat"));
        assert!(produced.packets[1].server_path().ends_with("c.dat"));
    }
}
