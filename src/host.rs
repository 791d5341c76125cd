//! [`RenderBackend`] backed by a host application process
//!
//! The host command is started once and receives one JSON request per line on
//! stdin, tagged by `cmd`. It answers each request with one JSON line on stdout
//! carrying `"ok": true` plus the reply fields, or `"ok": false` and `"error"`.
//! Rendered frames are exchanged as image files: the color image as 8-bit RGB
//! and the instance map as 16-bit grayscale.

use log::{debug, warn};
use nalgebra as na;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use crate::camera::Intrinsics;
use crate::error::{Error, Result};
use crate::render::{InstanceAttribute, RenderBackend, RenderedFrame};
use crate::scene::{ObjectKind, SceneObject};

#[derive(Debug, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request<'a> {
    OpenScene {
        path: &'a Path,
    },
    CameraPose {
        frame: u32,
    },
    SetIntrinsics {
        k: [[f64; 3]; 3],
        width: u32,
        height: u32,
    },
    LoadObjects {
        path: &'a Path,
        obj_types: &'a [ObjectKind],
    },
    SetCategory {
        name: &'a str,
        category_id: u32,
    },
    ResetKeyframes,
    AddCameraPose {
        matrix: [[f64; 4]; 4],
    },
    Render {
        output_dir: &'a Path,
        map_by: &'a [&'a str],
    },
}

#[derive(Debug, Deserialize)]
struct Status {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CameraPoseReply {
    matrix_world: [[f64; 4]; 4],
}

#[derive(Debug, Deserialize)]
struct LoadObjectsReply {
    objects: Vec<SceneObject>,
}

#[derive(Debug, Deserialize)]
struct RenderReply {
    colors: PathBuf,
    instance_segmap: PathBuf,
    instance_attribute_maps: Vec<InstanceAttribute>,
}

/// Host application process speaking line-delimited JSON
pub struct HostBridge {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    stdout: BufReader<ChildStdout>,
    scratch_dir: PathBuf,
}

impl HostBridge {
    /// Start `command` (program followed by its arguments, split on whitespace)
    pub fn spawn(command: &str, scratch_dir: &Path) -> Result<Self> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| Error::Host("empty host command".to_string()))?;

        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::Host(format!("failed to start {:?}: {}", command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Host("host stdin is not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Host("host stdout is not captured".to_string()))?;

        Ok(Self {
            child,
            stdin: Some(BufWriter::new(stdin)),
            stdout: BufReader::new(stdout),
            scratch_dir: scratch_dir.to_path_buf(),
        })
    }

    fn call<T: DeserializeOwned>(&mut self, request: &Request) -> Result<T> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::Host("host stdin is closed".to_string()))?;
        // A host that already exited shows up here as a broken pipe
        serde_json::to_writer(&mut *stdin, request)
            .map_err(io::Error::from)
            .and_then(|_| {
                stdin.write_all(b"\n")?;
                stdin.flush()
            })
            .map_err(|e| Error::Host(format!("failed to send request: {}", e)))?;

        let mut line = String::new();
        let read = self
            .stdout
            .read_line(&mut line)
            .map_err(|e| Error::Host(format!("failed to read reply: {}", e)))?;
        if read == 0 {
            return Err(Error::Host(
                "host application closed its output".to_string(),
            ));
        }
        debug!("host reply: {}", line.trim_end());

        let value: serde_json::Value = serde_json::from_str(&line)
            .map_err(|e| Error::Host(format!("unreadable reply {:?}: {}", line.trim_end(), e)))?;
        let status: Status = serde_json::from_value(value.clone())
            .map_err(|e| Error::Host(format!("reply without status: {}", e)))?;
        if !status.ok {
            return Err(Error::Host(
                status
                    .error
                    .unwrap_or_else(|| "request failed without a message".to_string()),
            ));
        }
        serde_json::from_value(value).map_err(|e| Error::Host(format!("malformed reply: {}", e)))
    }
}

impl RenderBackend for HostBridge {
    fn open_scene(&mut self, scene: &Path) -> Result<()> {
        self.call::<IgnoredAny>(&Request::OpenScene { path: scene })?;
        Ok(())
    }

    fn camera_pose_at(&mut self, frame: u32) -> Result<na::Matrix4<f64>> {
        let reply: CameraPoseReply = self.call(&Request::CameraPose { frame })?;
        let m = reply.matrix_world;
        Ok(na::Matrix4::from_fn(|r, c| m[r][c]))
    }

    fn set_intrinsics(&mut self, intrinsics: &Intrinsics, width: u32, height: u32) -> Result<()> {
        let k = intrinsics.k_matrix();
        self.call::<IgnoredAny>(&Request::SetIntrinsics {
            k: std::array::from_fn(|r| std::array::from_fn(|c| k[(r, c)])),
            width,
            height,
        })?;
        Ok(())
    }

    fn load_objects(&mut self, scene: &Path, kinds: &[ObjectKind]) -> Result<Vec<SceneObject>> {
        let reply: LoadObjectsReply = self.call(&Request::LoadObjects {
            path: scene,
            obj_types: kinds,
        })?;
        Ok(reply.objects)
    }

    fn set_category(&mut self, object_name: &str, category_id: u32) -> Result<()> {
        self.call::<IgnoredAny>(&Request::SetCategory {
            name: object_name,
            category_id,
        })?;
        Ok(())
    }

    fn reset_keyframes(&mut self) -> Result<()> {
        self.call::<IgnoredAny>(&Request::ResetKeyframes)?;
        Ok(())
    }

    fn add_camera_pose(&mut self, pose: &na::Matrix4<f64>) -> Result<()> {
        self.call::<IgnoredAny>(&Request::AddCameraPose {
            matrix: std::array::from_fn(|r| std::array::from_fn(|c| pose[(r, c)])),
        })?;
        Ok(())
    }

    fn render(&mut self) -> Result<RenderedFrame> {
        let scratch_dir = self.scratch_dir.clone();
        let reply: RenderReply = self.call(&Request::Render {
            output_dir: &scratch_dir,
            map_by: &["instance", "class", "name"],
        })?;

        let colors = image::open(&reply.colors)?.into_rgb8();
        let instance_segmap = image::open(&reply.instance_segmap)?.into_luma16();
        Ok(RenderedFrame {
            colors,
            instance_segmap,
            instance_attributes: reply.instance_attribute_maps,
        })
    }
}

impl Drop for HostBridge {
    fn drop(&mut self) {
        // Closing stdin tells the host to exit
        drop(self.stdin.take());
        match self.child.wait() {
            Ok(status) if !status.success() => {
                warn!("Host application exited with {}", status)
            }
            Err(e) => warn!("Failed to wait for the host application: {}", e),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    #[test]
    fn test_request_wire_format() {
        assert_eq!(
            serde_json::to_value(Request::ResetKeyframes).unwrap(),
            json!({"cmd": "reset_keyframes"})
        );
        assert_eq!(
            serde_json::to_value(Request::CameraPose { frame: 3 }).unwrap(),
            json!({"cmd": "camera_pose", "frame": 3})
        );
        assert_eq!(
            serde_json::to_value(Request::LoadObjects {
                path: Path::new("scene.blend"),
                obj_types: &[ObjectKind::Mesh, ObjectKind::Camera],
            })
            .unwrap(),
            json!({"cmd": "load_objects", "path": "scene.blend", "obj_types": ["mesh", "camera"]})
        );
        assert_eq!(
            serde_json::to_value(Request::SetCategory {
                name: "Gun",
                category_id: 1,
            })
            .unwrap(),
            json!({"cmd": "set_category", "name": "Gun", "category_id": 1})
        );
        assert_eq!(
            serde_json::to_value(Request::Render {
                output_dir: Path::new("/tmp/frames"),
                map_by: &["instance", "class", "name"],
            })
            .unwrap(),
            json!({"cmd": "render", "output_dir": "/tmp/frames", "map_by": ["instance", "class", "name"]})
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_host_replies() {
        let temp_dir = tempfile::tempdir().unwrap();
        let script = temp_dir.path().join("fake_host.sh");
        fs::write(
            &script,
            r#"read -r request
printf '{"ok":true,"echo":%s}\n' "$request"
read -r request
echo '{"ok":true,"matrix_world":[[1,2,3,4],[5,6,7,8],[9,10,11,12],[0,0,0,1]]}'
read -r request
echo '{"ok":false,"error":"no scene loaded"}'
"#,
        )
        .unwrap();

        let mut host =
            HostBridge::spawn(&format!("sh {}", script.display()), temp_dir.path()).unwrap();

        let reply: serde_json::Value = host.call(&Request::ResetKeyframes).unwrap();
        assert_eq!(reply["echo"], json!({"cmd": "reset_keyframes"}));

        let matrix = host.camera_pose_at(1).unwrap();
        assert_eq!(matrix[(0, 1)], 2.0);
        assert_eq!(matrix[(1, 0)], 5.0);
        assert_eq!(matrix[(0, 3)], 4.0);
        assert_eq!(matrix[(2, 3)], 12.0);

        match host.open_scene(Path::new("scene.blend")) {
            Err(Error::Host(message)) => assert_eq!(message, "no scene loaded"),
            other => panic!("expected a host error, got {:?}", other),
        }

        // The script has exited, so the next request finds no reply
        assert!(matches!(host.reset_keyframes(), Err(Error::Host(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_exited_host_is_a_host_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut host = HostBridge::spawn("true", temp_dir.path()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(300));

        match host.open_scene(Path::new("scene.blend")) {
            Err(Error::Host(_)) => {}
            other => panic!("expected a host error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_program() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            HostBridge::spawn("", temp_dir.path()),
            Err(Error::Host(_))
        ));
        assert!(matches!(
            HostBridge::spawn("definitely-not-a-host-binary-4711", temp_dir.path()),
            Err(Error::Host(_))
        ));
    }
}
