use bugreport::{
    bugreport,
    collector::{CompileTimeInformation, EnvironmentVariables, OperatingSystem, SoftwareVersion},
    format::Markdown,
};

pub fn run() {
    bugreport!()
        .info(SoftwareVersion::default())
        .info(OperatingSystem::default())
        // secrets (key id / secret key) deliberately left out
        .info(EnvironmentVariables::list(&[
            "SHELL",
            "TERM",
            "PAIL_S3_ENDPOINT",
            "PAIL_S3_REGION",
            "PAIL_S3_BUCKET",
            "PAIL_PORT",
            "PAIL_ALLOWED_ORIGIN",
            "RUST_LOG",
        ]))
        .info(CompileTimeInformation::default())
        .print::<Markdown>();
}
