/// Wire payloads that decode into domain values.
pub trait RemoteResponse<T> {
    fn to_domain(&self) -> anyhow::Result<T>;
}
