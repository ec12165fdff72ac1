//! Shader stage and program wrappers.

use std::{fs, io, path::Path};

use thiserror::Error;

use crate::device::{DeviceRef, ProgramHandle, ShaderHandle, ShaderStage, UniformLocation};

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("Couldn't read shader source {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{stage} shader compilation failed: {log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("Program link failed: {log}")]
    Link { log: String },
}

pub struct Shader {
    device: DeviceRef,
    handle: ShaderHandle,
    stage: ShaderStage,
}

impl Shader {
    pub fn new(device: &DeviceRef, stage: ShaderStage) -> Self {
        let handle = device.create_shader(stage);
        Self {
            device: device.clone(),
            handle,
            stage,
        }
    }

    /// Read `path` into a new shader. The shader is not compiled yet.
    pub fn load(device: &DeviceRef, stage: ShaderStage, path: &Path) -> Result<Self, ShaderError> {
        let source = fs::read_to_string(path).map_err(|source| ShaderError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let shader = Self::new(device, stage);
        shader.set_source(&source);
        Ok(shader)
    }

    pub fn set_source(&self, source: &str) {
        self.device.shader_source(self.handle, source);
    }

    /// Compile; on failure the error carries the device's info log.
    pub fn compile(&self) -> Result<(), ShaderError> {
        if self.device.compile_shader(self.handle) {
            Ok(())
        } else {
            Err(ShaderError::Compile {
                stage: self.stage,
                log: self.info_log(),
            })
        }
    }

    pub fn info_log(&self) -> String {
        self.device.shader_info_log(self.handle)
    }

    #[inline]
    pub fn handle(&self) -> ShaderHandle {
        self.handle
    }

    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        self.device.delete_shader(self.handle);
    }
}

pub struct Program {
    device: DeviceRef,
    handle: ProgramHandle,
}

impl Program {
    pub fn new(device: &DeviceRef) -> Self {
        let handle = device.create_program();
        Self {
            device: device.clone(),
            handle,
        }
    }

    /// Compile both stages from source, attach and link.
    pub fn build(device: &DeviceRef, vs_src: &str, fs_src: &str) -> Result<Self, ShaderError> {
        let vs = Shader::new(device, ShaderStage::Vertex);
        vs.set_source(vs_src);
        vs.compile()?;

        let fs = Shader::new(device, ShaderStage::Fragment);
        fs.set_source(fs_src);
        fs.compile()?;

        Self::link_stages(device, &[&vs, &fs])
    }

    /// Read both stage sources from disk, then [`Program::build`].
    pub fn load(device: &DeviceRef, vs_path: &Path, fs_path: &Path) -> Result<Self, ShaderError> {
        let vs = Shader::load(device, ShaderStage::Vertex, vs_path)?;
        vs.compile()?;
        let fs = Shader::load(device, ShaderStage::Fragment, fs_path)?;
        fs.compile()?;
        Self::link_stages(device, &[&vs, &fs])
    }

    fn link_stages(device: &DeviceRef, stages: &[&Shader]) -> Result<Self, ShaderError> {
        let program = Self::new(device);
        for shader in stages {
            program.attach(shader);
        }
        program.link()?;
        log::debug!("Linked program {}", program.handle);
        Ok(program)
    }

    pub fn attach(&self, shader: &Shader) {
        self.device.attach_shader(self.handle, shader.handle());
    }

    pub fn link(&self) -> Result<(), ShaderError> {
        if self.device.link_program(self.handle) {
            Ok(())
        } else {
            Err(ShaderError::Link {
                log: self.info_log(),
            })
        }
    }

    pub fn info_log(&self) -> String {
        self.device.program_info_log(self.handle)
    }

    pub fn use_program(&self) {
        self.device.use_program(Some(self.handle));
    }

    pub fn stop(&self) {
        self.device.use_program(None);
    }

    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        let location = self.device.uniform_location(self.handle, name);
        if location.is_none() {
            log::warn!("Uniform '{name}' not found in program {}", self.handle);
        }
        location
    }

    #[inline]
    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        self.device.delete_program(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{DeviceCall, RecordingDevice, ResourceKind};
    use std::rc::Rc;

    #[test]
    fn build_links_and_releases_stages() {
        let rec = Rc::new(RecordingDevice::new());
        let device: DeviceRef = rec.clone();
        let program = Program::build(&device, "uniform vec4 uDiffuse;", "void main() {}").unwrap();
        program.use_program();
        assert!(rec.calls().contains(&DeviceCall::UseProgram(Some(program.handle()))));
        // Stage objects are dropped once linked.
        assert_eq!(rec.live(ResourceKind::Shader), 0);
        assert_eq!(rec.live(ResourceKind::Program), 1);
        program.stop();
        drop(program);
        assert_eq!(rec.deleted(ResourceKind::Program), 1);
        assert!(rec.misuse().is_empty());
    }

    #[test]
    fn compile_failure_carries_log() {
        let device: DeviceRef = Rc::new(RecordingDevice::new());
        match Program::build(&device, "", "void main() {}") {
            Err(ShaderError::Compile { stage, log }) => {
                assert_eq!(stage, ShaderStage::Vertex);
                assert!(log.contains("empty source"));
            }
            other => panic!("expected compile error, got {:?}", other.err()),
        }
    }

    #[test]
    fn load_reports_missing_file() {
        let device: DeviceRef = Rc::new(RecordingDevice::new());
        let err = Shader::load(&device, ShaderStage::Vertex, Path::new("/no/such/shader.wgsl"))
            .err()
            .unwrap();
        assert!(matches!(err, ShaderError::Io { .. }));
    }

    #[test]
    fn load_reads_both_stages() {
        let dir = tempfile::tempdir().unwrap();
        let vs = dir.path().join("vs.wgsl");
        let fs_path = dir.path().join("fs.wgsl");
        fs::write(&vs, "vertex").unwrap();
        fs::write(&fs_path, "fragment").unwrap();
        let device: DeviceRef = Rc::new(RecordingDevice::new());
        assert!(Program::load(&device, &vs, &fs_path).is_ok());
    }
}
