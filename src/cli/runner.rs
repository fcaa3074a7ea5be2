//! Runs one parsed command against the dashboard

use crate::cli::args::{Args, Command, FsCommand, ImageCommand, NamespaceCommand, SnapshotCommand};
use crate::client::CephClient;
use crate::error::{CephError, Result};
use crate::logging::Logger;
use crate::operations::block::{RbdCopy, RbdCreate};
use crate::operations::fs::Quota;
use futures::future::try_join_all;
use serde::Serialize;
use std::time::Duration;

pub struct Runner {
    args: Args,
    output: Logger,
}

impl Runner {
    pub fn new(args: Args) -> Result<Self> {
        let output = if args.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(args.verbose)
        };

        Ok(Self { args, output })
    }

    pub async fn run(&self) -> Result<()> {
        self.args.validate().map_err(CephError::Validation)?;

        let client = CephClient::builder(self.args.client_config())
            .with_logger(self.output.clone())
            .build()?;

        let username = self.args.username.as_deref().unwrap_or_default();
        let password = self.args.password.as_deref().unwrap_or_default();
        client.login(username, password).await?;

        let result = self.dispatch(&client).await;

        if let Err(e) = client.logout().await {
            self.output.warning(&format!("Logout failed: {}", e));
        }

        if result.is_ok() {
            self.output.detail(&format!(
                "Finished in {}",
                self.output.format_duration(self.output.elapsed())
            ));
        }
        result
    }

    async fn dispatch(&self, client: &CephClient) -> Result<()> {
        match &self.args.command {
            Command::Image(command) => self.run_image(client, command).await,
            Command::Snapshot(SnapshotCommand::Create {
                location,
                image,
                snapshot,
            }) => {
                let status = client
                    .snapshot()
                    .create_snapshot(&location.pool, location.namespace(), image, snapshot)
                    .await?;
                self.report_status("snapshot created", status);
                Ok(())
            }
            Command::Namespace(command) => self.run_namespace(client, command).await,
            Command::Fs(command) => self.run_fs(client, command).await,
            Command::Tasks { name } => {
                let tasks = client.tasks().list_tasks(name.as_deref()).await?;
                print_json(&tasks)
            }
        }
    }

    async fn run_image(&self, client: &CephClient, command: &ImageCommand) -> Result<()> {
        let block = client.block();

        match command {
            ImageCommand::List { pool } => {
                let pools = block.list_images(pool.as_deref()).await?;
                for pool in &pools {
                    for image in &pool.value {
                        println!("{}\t{}", image.spec(), self.output.format_size(image.size));
                    }
                }
                Ok(())
            }
            ImageCommand::Get { location, name } => {
                let image = block.get_image(&location.pool, location.namespace(), name).await?;
                print_json(&image)
            }
            ImageCommand::Create {
                location,
                name,
                size,
                obj_size,
                features,
            } => {
                let mut create = RbdCreate::new(&location.pool, name, *size)
                    .with_obj_size(*obj_size)
                    .with_features(features.clone());
                if let Some(ns) = &location.namespace {
                    create = create.with_namespace(ns);
                }
                let status = block.create_image(&create).await?;
                self.report_status("image created", status);
                Ok(())
            }
            ImageCommand::Delete { location, names } => {
                self.output.section(&format!("Deleting {} image(s)", names.len()));
                let deletes = names
                    .iter()
                    .map(|name| block.delete_image(&location.pool, location.namespace(), name));
                let statuses = try_join_all(deletes).await?;
                for (name, status) in names.iter().zip(statuses) {
                    self.report_status(&format!("{} deleted", name), status);
                }
                Ok(())
            }
            ImageCommand::Trash {
                location,
                name,
                delay,
            } => {
                let status = block
                    .move_image_to_trash(
                        &location.pool,
                        location.namespace(),
                        name,
                        Duration::from_secs(*delay),
                    )
                    .await?;
                self.report_status("image moved to trash", status);
                Ok(())
            }
            ImageCommand::Copy {
                location,
                name,
                dest_name,
                dest_pool,
                dest_namespace,
            } => {
                let copy = RbdCopy::new(
                    dest_pool.clone().unwrap_or_else(|| location.pool.clone()),
                    dest_name,
                )
                .with_dest_namespace(dest_namespace.clone());
                let status = block
                    .copy_image(&location.pool, location.namespace(), name, &copy)
                    .await?;
                self.report_status("image copied", status);
                Ok(())
            }
            ImageCommand::Rename {
                location,
                name,
                new_name,
            } => {
                let status = block
                    .rename_image(&location.pool, location.namespace(), name, new_name)
                    .await?;
                self.report_status("image renamed", status);
                Ok(())
            }
            ImageCommand::Resize {
                location,
                name,
                size,
            } => {
                let status = block
                    .resize_image(&location.pool, location.namespace(), name, *size)
                    .await?;
                self.report_status("image resized", status);
                Ok(())
            }
        }
    }

    async fn run_namespace(&self, client: &CephClient, command: &NamespaceCommand) -> Result<()> {
        let namespaces = client.namespace();

        match command {
            NamespaceCommand::List { pool } => {
                for ns in namespaces.list_namespaces(pool).await? {
                    match ns.num_images {
                        Some(count) => println!("{}\t{} image(s)", ns.namespace, count),
                        None => println!("{}", ns.namespace),
                    }
                }
                Ok(())
            }
            NamespaceCommand::Create { pool, namespace } => {
                let status = namespaces.create_namespace(pool, namespace).await?;
                self.report_status("namespace created", status);
                Ok(())
            }
            NamespaceCommand::Delete { pool, namespace } => {
                let status = namespaces.delete_namespace(pool, namespace).await?;
                self.report_status("namespace deleted", status);
                Ok(())
            }
        }
    }

    async fn run_fs(&self, client: &CephClient, command: &FsCommand) -> Result<()> {
        let fs = client.fs();

        match command {
            FsCommand::List => {
                for entry in fs.list_fs().await? {
                    println!("{}\t{}", entry.id, entry.mdsmap.fs_name);
                }
                Ok(())
            }
            FsCommand::Ls { fs_id, path, depth } => {
                for dir in fs.ls_dir(*fs_id, path, *depth).await? {
                    println!("{}", dir.path);
                }
                Ok(())
            }
            FsCommand::Mkdir { fs_id, path } => {
                let status = fs.create_dir(*fs_id, path).await?;
                self.report_status("directory created", status);
                Ok(())
            }
            FsCommand::Rmdir { fs_id, path } => {
                let status = fs.delete_dir(*fs_id, path).await?;
                self.report_status("directory removed", status);
                Ok(())
            }
            FsCommand::Quota {
                fs_id,
                path,
                max_bytes,
                max_files,
            } => {
                if max_bytes.is_none() && max_files.is_none() {
                    return print_json(&fs.get_quota(*fs_id, path).await?);
                }
                let current = fs.get_quota(*fs_id, path).await?;
                let quota = Quota::new(
                    path.clone(),
                    max_bytes.unwrap_or(current.max_bytes),
                    max_files.unwrap_or(current.max_files),
                );
                let status = fs.set_quota(*fs_id, &quota).await?;
                self.report_status("quota set", status);
                Ok(())
            }
        }
    }

    fn report_status(&self, what: &str, status: u16) {
        self.output.success(&format!("{} (HTTP {})", what, status));
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
