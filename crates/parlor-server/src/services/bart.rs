//! BART food group: icon blobs addressed by content hash.

use parlor_shared::wire::bodies::bart::{
    self, replycode, subgroup, BartId, DownloadQuery, DownloadReply, UploadQuery, UploadReply,
};
use parlor_shared::wire::{SnacFrame, SnacMessage};

use crate::error::{Result, ServerError};
use crate::services::Deps;

pub struct BartService {
    deps: Deps,
}

impl BartService {
    pub fn new(deps: Deps) -> Self {
        Self { deps }
    }

    /// SNAC(0x10,0x02): store the blob and return its content address.
    pub async fn upload(&self, frame: SnacFrame, body: UploadQuery) -> Result<SnacMessage> {
        let reply = match self.deps.bart.put(&body.data).await {
            Ok(hash) => UploadReply {
                code: replycode::SUCCESS,
                id: BartId {
                    asset_type: body.asset_type,
                    flags: 0x01,
                    hash,
                },
            },
            Err(ServerError::Io(e)) if e.kind() == std::io::ErrorKind::InvalidData => UploadReply {
                code: replycode::TOO_BIG,
                id: BartId::default(),
            },
            Err(e) => return Err(e),
        };
        let mut payload = Vec::new();
        reply.encode(&mut payload);
        Ok(SnacMessage::new(
            SnacFrame::reply_to(frame, subgroup::UPLOAD_REPLY),
            payload,
        ))
    }

    /// SNAC(0x10,0x04): fetch the first requested blob. Missing hashes get
    /// a not-found reply rather than an error; the connection survives.
    pub async fn download(&self, frame: SnacFrame, body: DownloadQuery) -> Result<SnacMessage> {
        let Some(id) = body.ids.into_iter().next() else {
            return Ok(not_found_reply(frame, body.screen_name, BartId::default()));
        };

        let reply = match self.deps.bart.get(&id.hash).await {
            Ok(data) => {
                let mut payload = Vec::new();
                DownloadReply {
                    screen_name: body.screen_name,
                    id,
                    data,
                }
                .encode(&mut payload);
                SnacMessage::new(SnacFrame::reply_to(frame, subgroup::DOWNLOAD_REPLY), payload)
            }
            Err(ServerError::BlobNotFound(_)) => not_found_reply(frame, body.screen_name, id),
            Err(e) => return Err(e),
        };
        Ok(reply)
    }
}

fn not_found_reply(frame: SnacFrame, screen_name: String, id: BartId) -> SnacMessage {
    let mut payload = Vec::new();
    DownloadReply {
        screen_name,
        id: BartId {
            flags: bart::replycode::NOT_FOUND,
            ..id
        },
        data: Vec::new(),
    }
    .encode(&mut payload);
    SnacMessage::new(SnacFrame::reply_to(frame, subgroup::DOWNLOAD_REPLY), payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testutil::test_deps;
    use bytes::Bytes;
    use parlor_shared::wire::bodies::bart::asset;
    use parlor_shared::wire::snac::foodgroup;

    fn frame(sub_group: u16) -> SnacFrame {
        SnacFrame::new(foodgroup::BART, sub_group)
    }

    #[tokio::test]
    async fn test_upload_then_download() {
        let (deps, _dir) = test_deps().await;
        let svc = BartService::new(deps);

        let reply = svc
            .upload(
                frame(subgroup::UPLOAD_QUERY),
                UploadQuery {
                    asset_type: asset::BUDDY_ICON,
                    data: b"GIF89a-icon".to_vec(),
                },
            )
            .await
            .unwrap();
        let uploaded = UploadReply::decode(&mut Bytes::from(reply.body)).unwrap();
        assert_eq!(uploaded.code, replycode::SUCCESS);
        assert!(!uploaded.id.hash.is_empty());

        let reply = svc
            .download(
                frame(subgroup::DOWNLOAD_QUERY),
                DownloadQuery {
                    screen_name: "alice".to_string(),
                    ids: vec![uploaded.id],
                },
            )
            .await
            .unwrap();
        let downloaded = DownloadReply::decode(&mut Bytes::from(reply.body)).unwrap();
        assert_eq!(downloaded.data, b"GIF89a-icon");
    }

    #[tokio::test]
    async fn test_download_missing_hash() {
        let (deps, _dir) = test_deps().await;
        let svc = BartService::new(deps);

        let reply = svc
            .download(
                frame(subgroup::DOWNLOAD_QUERY),
                DownloadQuery {
                    screen_name: "alice".to_string(),
                    ids: vec![BartId {
                        asset_type: asset::BUDDY_ICON,
                        flags: 0x01,
                        hash: vec![0xAA; 16],
                    }],
                },
            )
            .await
            .unwrap();
        let body = DownloadReply::decode(&mut Bytes::from(reply.body)).unwrap();
        assert_eq!(body.id.flags, replycode::NOT_FOUND);
        assert!(body.data.is_empty());
    }
}
