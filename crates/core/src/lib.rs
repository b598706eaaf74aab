pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod model_resolver;
    pub mod region;
}

pub mod source {
    pub mod domain {
        pub mod frame_source;
    }
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod detection_config;
        pub mod object_detector;
        pub mod rect_grouper;
    }
    pub mod infrastructure;
}

pub mod annotation {
    pub mod domain {
        pub mod frame_annotator;
    }
    pub mod infrastructure {
        pub mod image_file_writer;
        pub mod rectangle_annotator;
    }
}

pub mod pipeline {
    pub mod acquisition_loop;
    pub mod configuration_channel;
    pub mod detection_pipeline;
    pub mod latest_metric;
    pub mod metric_publisher;
    pub mod pipeline_logger;
}

pub mod telemetry {
    pub mod domain {
        pub mod metric_sink;
    }
    pub mod infrastructure {
        pub mod serial_port_sink;
    }
}

#[cfg(test)]
pub(crate) mod test_support;
