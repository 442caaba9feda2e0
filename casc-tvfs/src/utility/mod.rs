pub(crate) mod dsv_file;
pub(crate) mod jenkins_hash;
