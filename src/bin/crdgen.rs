use anyhow::Context;
use devfile_registry_operator::crd::{
    ClusterDevfileRegistriesList, DevfileRegistriesList, DevfileRegistry,
};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crds = [
        DevfileRegistry::crd(),
        DevfileRegistriesList::crd(),
        ClusterDevfileRegistriesList::crd(),
    ];

    for crd in crds {
        let yaml = serde_yaml::to_string(&crd)
            .with_context(|| format!("serializing CRD {:?}", crd.metadata.name))?;
        println!("---");
        print!("{yaml}");
    }
    Ok(())
}
